//! Engine-agnostic request records accepted by the connector.

use std::fmt;

use serde::{Deserialize, Serialize};

use explorer_core::{EdgeId, VertexId};

/// The fixed set of graph operations the connector knows how to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    FetchSchema,
    KeywordSearch,
    FetchNeighborsCount,
    FetchNeighbors,
    FetchNeighborPredicates,
    VertexDetails,
    EdgeDetails,
    FetchEdgeConnections,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchSchema => "fetchSchema",
            Self::KeywordSearch => "keywordSearch",
            Self::FetchNeighborsCount => "fetchNeighborsCount",
            Self::FetchNeighbors => "fetchNeighbors",
            Self::FetchNeighborPredicates => "fetchNeighborPredicates",
            Self::VertexDetails => "vertexDetails",
            Self::EdgeDetails => "edgeDetails",
            Self::FetchEdgeConnections => "fetchEdgeConnections",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search vertices by attribute value.
///
/// An absent or empty `search_term` lists vertices without a value filter.
/// An empty `search_by_attributes` matches the term against any attribute.
/// `limit == 0` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSearchRequest {
    pub search_term: Option<String>,
    pub vertex_types: Vec<String>,
    pub search_by_attributes: Vec<String>,
    pub exact_match: bool,
    pub limit: u32,
    pub offset: u32,
}

impl KeywordSearchRequest {
    /// The search term, if one was given and it is not blank.
    pub fn term(&self) -> Option<&str> {
        self.search_term.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Count the distinct neighbors of a vertex, looking at no more than
/// `limit` of them (`0` = all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborsCountRequest {
    pub vertex_id: VertexId,
    pub limit: u32,
}

/// Expand one hop from a vertex, optionally filtered by neighbor and edge types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborsRequest {
    pub vertex_id: VertexId,
    pub vertex_types: Vec<String>,
    pub edge_types: Vec<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Discover which edge types hang off one or more vertices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborPredicatesRequest {
    pub vertex_ids: Vec<VertexId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexDetailsRequest {
    pub vertex_id: VertexId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDetailsRequest {
    pub edge_id: EdgeId,
}

/// Every request the connector accepts, tagged by operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum QueryRequest {
    Schema,
    KeywordSearch(KeywordSearchRequest),
    NeighborsCount(NeighborsCountRequest),
    Neighbors(NeighborsRequest),
    NeighborPredicates(NeighborPredicatesRequest),
    VertexDetails(VertexDetailsRequest),
    EdgeDetails(EdgeDetailsRequest),
    EdgeConnections,
}

impl QueryRequest {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Schema => Operation::FetchSchema,
            Self::KeywordSearch(_) => Operation::KeywordSearch,
            Self::NeighborsCount(_) => Operation::FetchNeighborsCount,
            Self::Neighbors(_) => Operation::FetchNeighbors,
            Self::NeighborPredicates(_) => Operation::FetchNeighborPredicates,
            Self::VertexDetails(_) => Operation::VertexDetails,
            Self::EdgeDetails(_) => Operation::EdgeDetails,
            Self::EdgeConnections => Operation::FetchEdgeConnections,
        }
    }
}
