//! Error types for the explorer-connector crate.

use explorer_core::Engine;
use thiserror::Error;

use crate::request::Operation;

/// A request violates a query builder's preconditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("{operation} needs at least one {what}")]
    EmptyBatch {
        operation: Operation,
        what: &'static str,
    },

    #[error("Invalid IRI: {0:?}")]
    InvalidIri(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Blank node {0} cannot be referenced across queries")]
    BlankNodeReference(String),

    #[error("Malformed edge id: {0}")]
    MalformedEdgeId(String),

    #[error("{0} spans several queries and cannot be decoded from a single response")]
    MultiQuery(Operation),
}

/// The raw payload did not match the schema expected for the operation.
#[derive(Error, Debug)]
#[error("Unexpected {engine} response for {operation}: {message}")]
pub struct ResponseShapeError {
    pub engine: Engine,
    pub operation: Operation,
    pub message: String,
}

/// Errors from connector operations.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Query build error: {0}")]
    QueryBuild(#[from] QueryBuildError),

    #[error("Transport error during {engine} {operation}: {source}")]
    Transport {
        engine: Engine,
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    ResponseShape(#[from] ResponseShapeError),

    #[error("Empty result from {engine} {operation}")]
    EmptyResult { engine: Engine, operation: Operation },
}

/// Parser-level failure, before engine/operation context is attached.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{0}")]
    Shape(String),

    #[error("response carried no result")]
    Empty,
}

impl ParseError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    pub(crate) fn in_context(self, engine: Engine, operation: Operation) -> ConnectorError {
        match self {
            Self::Shape(message) => ConnectorError::ResponseShape(ResponseShapeError {
                engine,
                operation,
                message,
            }),
            Self::Empty => ConnectorError::EmptyResult { engine, operation },
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Shape(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;
pub type ParseResult<T> = std::result::Result<T, ParseError>;
