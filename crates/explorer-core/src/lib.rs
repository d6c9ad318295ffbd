//! explorer-core: Shared entity model, configuration, and error handling for the graph explorer.
//!
//! This crate provides the foundational types used across all explorer components:
//! - Vertex and edge identities, entities, and the ordered `EntityMap`
//! - Schema types (vertex/edge types, attributes, edge connections)
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{CacheConfig, ExplorerConfig};
pub use error::ExplorerError;
pub use types::{
    AttributeDataType, AttributeSchema, AttributeValue, Attributes, Direction, Edge,
    EdgeConnection, EdgeId, EdgeMap, EdgeTypeSchema, Engine, Entity, EntityMap,
    NeighborPredicate, NeighborsCount, RawId, Schema, Vertex, VertexId, VertexMap,
    VertexTypeSchema,
};
