//! Error types for the explorer-materialize crate.

use std::sync::Arc;

use explorer_connector::ConnectorError;
use explorer_core::{EdgeId, VertexId};
use thiserror::Error;

/// Why a cached fetch produced no value. Shared by every caller that
/// waited on the same fetch, hence handed out behind an `Arc`.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("Fetch task aborted: {0}")]
    Aborted(String),
}

/// One entity that could not be materialized. Never fails the batch.
#[derive(Error, Debug, Clone)]
pub enum MaterializationError {
    #[error("Failed to materialize vertex {id}: {source}")]
    Vertex {
        id: VertexId,
        #[source]
        source: Arc<FetchError>,
    },

    #[error("Failed to materialize edge {id}: {source}")]
    Edge {
        id: EdgeId,
        #[source]
        source: Arc<FetchError>,
    },
}

pub type FetchResult<T> = std::result::Result<T, Arc<FetchError>>;
