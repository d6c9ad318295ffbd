//! CLI entry point for the explorer-query tool.
//!
//! Works offline: reads a JSON `QueryRequest` (from `--request` or stdin)
//! and either prints the query text an engine would be sent, or decodes a
//! saved engine response into explorer entities and prints them as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use explorer_connector::{Connector, QueryRequest, Transport};
use explorer_core::{Engine, ExplorerConfig};

#[derive(Parser)]
#[command(name = "explorer-query")]
#[command(about = "Render and decode graph explorer queries without a database")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Engine: gremlin, openCypher, sparql (otherwise read from config).
    #[arg(short, long, global = true)]
    engine: Option<String>,

    /// JSON request file (default: read from stdin).
    #[arg(short, long, global = true)]
    request: Option<PathBuf>,

    /// Config file prefix (default: explorer).
    #[arg(short, long, default_value = "explorer", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Print the query text for a request.
    Render,
    /// Decode a saved engine response for a request.
    Decode {
        /// Raw JSON response body as returned by the engine.
        #[arg(long)]
        response: PathBuf,
    },
}

/// Stands in for the network. Nothing this tool does reaches it.
struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn fetch(&self, _query: &str) -> anyhow::Result<Value> {
        anyhow::bail!("explorer-query runs offline and cannot send queries")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let engine = resolve_engine(&cli)?;
    let connector = Connector::new(engine, Arc::new(OfflineTransport));

    let input = match &cli.request {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let request: QueryRequest = serde_json::from_str(&input)?;

    let output = match &cli.command {
        Command::Render => render(&connector, &request)?,
        Command::Decode { response } => decode(&connector, &request, response)?,
    };
    println!("{output}");

    Ok(())
}

fn resolve_engine(cli: &Cli) -> anyhow::Result<Engine> {
    match cli.engine.as_deref() {
        Some(name) => Ok(name.parse()?),
        None => Ok(ExplorerConfig::load(&cli.config)?.engine),
    }
}

fn render(connector: &Connector, request: &QueryRequest) -> anyhow::Result<String> {
    let query = connector.render(request)?;
    tracing::info!(
        engine = %connector.engine(),
        operation = %request.operation(),
        "Rendered query"
    );
    Ok(query)
}

fn decode(connector: &Connector, request: &QueryRequest, path: &Path) -> anyhow::Result<String> {
    let body = std::fs::read_to_string(path)?;
    let response: Value = serde_json::from_str(&body)?;
    let decoded = connector.decode(request, &response)?;
    Ok(serde_json::to_string_pretty(&decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(engine: Engine) -> Connector {
        Connector::new(engine, Arc::new(OfflineTransport))
    }

    fn request(json: &str) -> QueryRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_render_vertex_details() {
        let request = request(r#"{"operation": "vertexDetails", "vertex_id": "v1"}"#);
        let query = render(&connector(Engine::Gremlin), &request).unwrap();
        assert_eq!(query, r#"g.V("v1")"#);
    }

    #[test]
    fn test_decode_saved_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.json");
        std::fs::write(
            &path,
            r#"{"result": {"data": {"@type": "g:List", "@value": []}}}"#,
        )
        .unwrap();

        let request = request(r#"{"operation": "vertexDetails", "vertex_id": "v1"}"#);
        let output = decode(&connector(Engine::Gremlin), &request, &path).unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["operation"], "vertexDetails");
        assert!(json["result"].is_null());
    }

    #[test]
    fn test_engine_flag_overrides_config() {
        let cli = Cli::parse_from(["explorer-query", "--engine", "sparql", "render"]);
        assert_eq!(resolve_engine(&cli).unwrap(), Engine::Sparql);

        let cli = Cli::parse_from(["explorer-query", "--engine", "neo4j", "render"]);
        assert!(resolve_engine(&cli).is_err());
    }

    #[tokio::test]
    async fn test_offline_transport_refuses_to_send() {
        let err = connector(Engine::Gremlin)
            .vertex_details(&explorer_connector::VertexDetailsRequest {
                vertex_id: explorer_core::VertexId::from_raw("v1".into()),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("vertexDetails"));
    }
}
