//! SPARQL 1.1 queries over the W3C JSON Results format.

pub mod parse;
pub mod templates;

use futures::future::BoxFuture;
use serde_json::Value;

use explorer_core::{EdgeConnection, EdgeTypeSchema, Engine, NeighborsCount, Schema, VertexTypeSchema};

use crate::codec::{decode_sparql_edge_id, HasRawId, IdCodec};
use crate::connector::{Connector, EngineDriver, Op};
use crate::error::{ParseError, ParseResult, QueryBuildError, Result};
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

fn raw_string<I: HasRawId>(id: &I) -> String {
    IdCodec::for_engine(Engine::Sparql).get_raw_id(id).to_string()
}

fn schema_queries() -> Vec<String> {
    vec![
        templates::class_counts(),
        templates::predicate_counts(),
        templates::edge_connections(),
    ]
}

fn fetch_schema(connector: &Connector) -> BoxFuture<'_, Result<Schema>> {
    Box::pin(discover_schema(connector))
}

/// Classes become vertex types and resource-valued predicates become
/// edge types. Predicates carry no attributes of their own.
async fn discover_schema(connector: &Connector) -> Result<Schema> {
    let op = Operation::FetchSchema;

    let class_counts = connector
        .fetch_parsed(op, &templates::class_counts(), |r| {
            parse::resource_counts(r, "class")
        })
        .await?;
    let mut class_attributes = if class_counts.is_empty() {
        Default::default()
    } else {
        let classes: Vec<String> = class_counts.keys().cloned().collect();
        connector
            .fetch_parsed(op, &templates::class_attributes(&classes)?, parse::class_attributes)
            .await?
    };

    let predicate_counts = connector
        .fetch_parsed(op, &templates::predicate_counts(), |r| {
            parse::resource_counts(r, "pred")
        })
        .await?;

    let edge_connections = connector
        .fetch_parsed(op, &templates::edge_connections(), parse::edge_connections)
        .await?;

    Ok(Schema {
        vertices: class_counts
            .into_iter()
            .map(|(vertex_type, total)| VertexTypeSchema {
                attributes: class_attributes
                    .remove(&vertex_type)
                    .map(|attributes| attribute_schemas(&attributes))
                    .unwrap_or_default(),
                vertex_type,
                total,
            })
            .collect(),
        edges: predicate_counts
            .into_iter()
            .map(|(edge_type, total)| EdgeTypeSchema {
                edge_type,
                total,
                attributes: Vec::new(),
            })
            .collect(),
        edge_connections,
    })
}

fn parse_keyword_search(_: &KeywordSearchRequest, response: &Value) -> ParseResult<Vec<RawVertex>> {
    parse::keyword_search(response)
}

fn parse_neighbors_count(_: &NeighborsCountRequest, response: &Value) -> ParseResult<NeighborsCount> {
    parse::neighbors_count(response)
}

// Statement edges and detail records are rebuilt from the request, since
// SPARQL rows never repeat the resource they were asked about.

fn parse_neighbors(
    request: &NeighborsRequest,
    response: &Value,
) -> ParseResult<(Vec<RawVertex>, Vec<RawEdge>)> {
    parse::neighbors(&raw_string(&request.vertex_id), response)
}

fn parse_neighbor_predicates(
    _: &NeighborPredicatesRequest,
    response: &Value,
) -> ParseResult<Vec<RawNeighborPredicate>> {
    parse::neighbor_predicates(response)
}

fn parse_vertex_details(request: &VertexDetailsRequest, response: &Value) -> ParseResult<Option<RawVertex>> {
    parse::vertex_details(&raw_string(&request.vertex_id), response)
}

fn parse_edge_details(request: &EdgeDetailsRequest, response: &Value) -> ParseResult<Option<RawEdge>> {
    let id = raw_string(&request.edge_id);
    let (subject, predicate, object) = decode_sparql_edge_id(&id)
        .ok_or_else(|| ParseError::shape(format!("malformed edge id {id}")))?;
    parse::edge_details((&subject, &predicate, &object), response)
}

fn build_edge_connections(_: &()) -> std::result::Result<String, QueryBuildError> {
    Ok(templates::edge_connections())
}

fn parse_edge_connections(_: &(), response: &Value) -> ParseResult<Vec<EdgeConnection>> {
    parse::edge_connections(response)
}
