//! explorer-connector: Query builders, response decoders and the engine
//! facade for Gremlin, openCypher and SPARQL backends.
//!
//! This crate provides:
//! - The identity codec that turns raw backend ids into comparable ids
//! - Injection-safe, whitespace-normalised query templates per engine
//! - Typed response parsers (GraphSON v3, openCypher rows, SPARQL JSON Results)
//! - The entity normalizer and its fragment policy
//! - [`Connector`], which runs operations through an injected [`Transport`]

pub mod codec;
pub mod connector;
pub mod error;
pub mod gremlin;
pub mod normalize;
pub mod opencypher;
pub mod request;
pub mod sparql;
pub mod template;
pub mod transport;

pub use codec::IdCodec;
pub use connector::{Connector, KeywordSearchResponse, NeighborsResponse, QueryResponse};
pub use error::{ConnectorError, QueryBuildError, ResponseShapeError, Result};
pub use request::{
    EdgeDetailsRequest, KeywordSearchRequest, NeighborPredicatesRequest, NeighborsCountRequest,
    NeighborsRequest, Operation, QueryRequest, VertexDetailsRequest,
};
pub use transport::{FnTransport, Transport};
