//! Gremlin (Apache TinkerPop) queries over GraphSON v3 responses.

pub mod graphson;
pub mod parse;
pub mod templates;

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde_json::Value;

use explorer_core::{EdgeConnection, EdgeTypeSchema, NeighborsCount, Schema, VertexTypeSchema};

use crate::connector::{Connector, EngineDriver, Op};
use crate::error::{ParseResult, QueryBuildError, Result};
use crate::normalize::{attribute_schemas, RawEdge, RawNeighborPredicate, RawVertex};
use crate::request::{
    EdgeDetailsRequest, KeywordSearchRequest, NeighborPredicatesRequest, NeighborsCountRequest,
    NeighborsRequest, Operation, VertexDetailsRequest,
};

pub(crate) static DRIVER: EngineDriver = EngineDriver {
    schema_queries,
    fetch_schema,
    keyword_search: Op {
        build: templates::keyword_search,
        parse: parse_keyword_search,
    },
    neighbors_count: Op {
        build: templates::neighbors_count,
        parse: parse_neighbors_count,
    },
    neighbors: Op {
        build: templates::neighbors,
        parse: parse_neighbors,
    },
    neighbor_predicates: Op {
        build: templates::neighbor_predicates,
        parse: parse_neighbor_predicates,
    },
    vertex_details: Op {
        build: templates::vertex_details,
        parse: parse_vertex_details,
    },
    edge_details: Op {
        build: templates::edge_details,
        parse: parse_edge_details,
    },
    edge_connections: Op {
        build: build_edge_connections,
        parse: parse_edge_connections,
    },
};

fn schema_queries() -> Vec<String> {
    vec![
        templates::vertex_type_counts(),
        templates::edge_type_counts(),
        templates::edge_connections(),
    ]
}

fn fetch_schema(connector: &Connector) -> BoxFuture<'_, Result<Schema>> {
    Box::pin(discover_schema(connector))
}

async fn discover_schema(connector: &Connector) -> Result<Schema> {
    let op = Operation::FetchSchema;

    let vertex_counts = connector
        .fetch_parsed(op, &templates::vertex_type_counts(), parse::group_count)
        .await?;
    let mut vertex_attributes = BTreeMap::new();
    if !vertex_counts.is_empty() {
        let labels: Vec<String> = vertex_counts.keys().cloned().collect();
        let samples = connector
            .fetch_parsed(op, &templates::vertex_samples(&labels)?, parse::vertex_samples)
            .await?;
        for sample in samples {
            if let Some(label) = sample.types.first() {
                vertex_attributes
                    .entry(label.clone())
                    .or_insert_with(|| attribute_schemas(&sample.attributes));
            }
        }
    }

    let edge_counts = connector
        .fetch_parsed(op, &templates::edge_type_counts(), parse::group_count)
        .await?;
    let mut edge_attributes = BTreeMap::new();
    if !edge_counts.is_empty() {
        let labels: Vec<String> = edge_counts.keys().cloned().collect();
        let samples = connector
            .fetch_parsed(op, &templates::edge_samples(&labels)?, parse::edge_samples)
            .await?;
        for sample in samples {
            edge_attributes
                .entry(sample.edge_type.clone())
                .or_insert_with(|| attribute_schemas(&sample.attributes));
        }
    }

    let edge_connections = connector
        .fetch_parsed(op, &templates::edge_connections(), parse::edge_connections)
        .await?;

    Ok(Schema {
        vertices: vertex_counts
            .into_iter()
            .map(|(vertex_type, total)| VertexTypeSchema {
                attributes: vertex_attributes.remove(&vertex_type).unwrap_or_default(),
                vertex_type,
                total,
            })
            .collect(),
        edges: edge_counts
            .into_iter()
            .map(|(edge_type, total)| EdgeTypeSchema {
                attributes: edge_attributes.remove(&edge_type).unwrap_or_default(),
                edge_type,
                total,
            })
            .collect(),
        edge_connections,
    })
}

// Gremlin responses carry everything needed; the request is not consulted.

fn parse_keyword_search(_: &KeywordSearchRequest, response: &Value) -> ParseResult<Vec<RawVertex>> {
    parse::keyword_search(response)
}

fn parse_neighbors_count(_: &NeighborsCountRequest, response: &Value) -> ParseResult<NeighborsCount> {
    parse::neighbors_count(response)
}

fn parse_neighbors(
    _: &NeighborsRequest,
    response: &Value,
) -> ParseResult<(Vec<RawVertex>, Vec<RawEdge>)> {
    parse::neighbors(response)
}

fn parse_neighbor_predicates(
    _: &NeighborPredicatesRequest,
    response: &Value,
) -> ParseResult<Vec<RawNeighborPredicate>> {
    parse::neighbor_predicates(response)
}

fn parse_vertex_details(_: &VertexDetailsRequest, response: &Value) -> ParseResult<Option<RawVertex>> {
    parse::vertex_details(response)
}

fn parse_edge_details(_: &EdgeDetailsRequest, response: &Value) -> ParseResult<Option<RawEdge>> {
    parse::edge_details(response)
}

fn build_edge_connections(_: &()) -> std::result::Result<String, QueryBuildError> {
    Ok(templates::edge_connections())
}

fn parse_edge_connections(_: &(), response: &Value) -> ParseResult<Vec<EdgeConnection>> {
    parse::edge_connections(response)
}
