//! openCypher queries over row-format JSON responses.

pub mod parse;
pub mod templates;

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

/// Counts first, then one sample per type for its attributes.
async fn discover_schema(connector: &Connector) -> Result<Schema> {
    let op = Operation::FetchSchema;

    let vertex_counts = connector
        .fetch_parsed(op, &templates::vertex_type_counts(), parse::vertex_type_counts)
        .await?;
    let mut vertices = Vec::with_capacity(vertex_counts.len());
    for (vertex_type, total) in vertex_counts {
        let sample = connector
            .fetch_parsed(op, &templates::vertex_sample(&vertex_type)?, parse::vertex_object)
            .await?;
        vertices.push(VertexTypeSchema {
            attributes: sample
                .map(|raw| attribute_schemas(&raw.attributes))
                .unwrap_or_default(),
            vertex_type,
            total,
        });
    }

    let edge_counts = connector
        .fetch_parsed(op, &templates::edge_type_counts(), parse::edge_type_counts)
        .await?;
    let mut edges = Vec::with_capacity(edge_counts.len());
    for (edge_type, total) in edge_counts {
        let sample = connector
            .fetch_parsed(op, &templates::edge_sample(&edge_type)?, parse::edge_object)
            .await?;
        edges.push(EdgeTypeSchema {
            attributes: sample
                .map(|raw| attribute_schemas(&raw.attributes))
                .unwrap_or_default(),
            edge_type,
            total,
        });
    }

    let edge_connections = connector
        .fetch_parsed(op, &templates::edge_connections(), parse::edge_connections)
        .await?;

    Ok(Schema {
        vertices,
        edges,
        edge_connections,
    })
}

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
    parse::vertex_object(response)
}

fn parse_edge_details(_: &EdgeDetailsRequest, response: &Value) -> ParseResult<Option<RawEdge>> {
    parse::edge_object(response)
}

fn build_edge_connections(_: &()) -> std::result::Result<String, QueryBuildError> {
    Ok(templates::edge_connections())
}

fn parse_edge_connections(_: &(), response: &Value) -> ParseResult<Vec<EdgeConnection>> {
    parse::edge_connections(response)
}
