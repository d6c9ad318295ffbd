//! Configuration management for explorer services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (EXPLORER__ prefix, `__` between sections)
//! 2. Config file (explorer.toml)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::ExplorerError;
use crate::types::Engine;

/// Top-level explorer configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExplorerConfig {
    /// Which engine the connection speaks.
    #[serde(default)]
    pub engine: Engine,

    /// Cap on neighbors inspected when counting (0 = unbounded).
    #[serde(default = "default_neighbors_count_limit")]
    pub neighbors_count_limit: u32,

    /// Default page size for keyword search (0 = unbounded).
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Eviction and staleness policy of the shared query-result cache.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached query results.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Results older than this are refetched on next use.
    #[serde(default = "default_time_to_live_secs")]
    pub time_to_live_secs: u64,
}

impl CacheConfig {
    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs(self.time_to_live_secs)
    }
}

fn default_neighbors_count_limit() -> u32 {
    500
}

fn default_search_limit() -> u32 {
    10
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_time_to_live_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            time_to_live_secs: default_time_to_live_secs(),
        }
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            neighbors_count_limit: default_neighbors_count_limit(),
            search_limit: default_search_limit(),
            cache: CacheConfig::default(),
        }
    }
}

impl ExplorerConfig {
    /// Load from `{file_prefix}.toml` (optional) overlaid with `EXPLORER__*`
    /// environment variables.
    pub fn load(file_prefix: &str) -> Result<Self, ExplorerError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("EXPLORER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: ExplorerConfig = cfg.try_deserialize()?;
        tracing::debug!(
            engine = %loaded.engine,
            neighbors_count_limit = loaded.neighbors_count_limit,
            cache_ttl_secs = loaded.cache.time_to_live_secs,
            "Explorer configuration loaded"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExplorerConfig::default();
        assert_eq!(config.engine, Engine::Gremlin);
        assert_eq!(config.neighbors_count_limit, 500);
        assert_eq!(config.search_limit, 10);
        assert_eq!(config.cache.max_capacity, 10_000);
        assert_eq!(config.cache.time_to_live(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explorer.toml");
        std::fs::write(
            &path,
            "engine = \"openCypher\"\nsearch_limit = 25\n\n[cache]\ntime_to_live_secs = 60\n",
        )
        .unwrap();

        let prefix = dir.path().join("explorer");
        let config = ExplorerConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.engine, Engine::OpenCypher);
        assert_eq!(config.search_limit, 25);
        assert_eq!(config.neighbors_count_limit, 500);
        assert_eq!(config.cache.time_to_live_secs, 60);
        assert_eq!(config.cache.max_capacity, 10_000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = ExplorerConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.search_limit, 10);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.toml"), "engine = \"neo4j\"\n").unwrap();
        let prefix = dir.path().join("bad");
        assert!(matches!(
            ExplorerConfig::load(prefix.to_str().unwrap()),
            Err(ExplorerError::Config(_))
        ));
    }
}
