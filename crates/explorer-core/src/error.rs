use thiserror::Error;

/// Errors shared by every explorer crate.
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown engine: {0} (expected gremlin, openCypher or sparql)")]
    UnknownEngine(String),
}
