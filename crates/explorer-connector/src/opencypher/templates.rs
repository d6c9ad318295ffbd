//! openCypher query templates.

use explorer_core::{Engine, VertexId};

use crate::codec::{HasRawId, IdCodec};
use crate::error::QueryBuildError;
use crate::query;
use crate::request::{
    EdgeDetailsRequest, KeywordSearchRequest, NeighborPredicatesRequest, NeighborsCountRequest,
    NeighborsRequest, Operation, VertexDetailsRequest,
};
use crate::template::{cypher_identifier, cypher_string, join_quoted};

type Result<T> = std::result::Result<T, QueryBuildError>;

/// Ids are compared as strings.
fn id_literal<I: HasRawId>(id: &I) -> String {
    cypher_string(&IdCodec::for_engine(Engine::OpenCypher).get_raw_id(id).to_string())
}

fn skip(offset: u32) -> String {
    if offset > 0 {
        format!("SKIP {offset}")
    } else {
        String::new()
    }
}

fn limit(limit: u32) -> String {
    if limit > 0 {
        format!("LIMIT {limit}")
    } else {
        String::new()
    }
}

/// `(v:`a` OR v:`b`)`, or nothing when no labels are given.
fn label_condition(variable: &str, labels: &[String]) -> Result<Option<String>> {
    if labels.is_empty() {
        return Ok(None);
    }
    let alternatives = labels
        .iter()
        .map(|label| -> Result<String> {
            Ok(format!("{variable}:{}", cypher_identifier(label)?))
        })
        .collect::<Result<Vec<_>>>()?
        .join(" OR ");
    Ok(Some(format!("({alternatives})")))
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join("\n  AND "))
    }
}

// ── Schema ───────────────────────────────────────────────────────

pub fn vertex_type_counts() -> String {
    "MATCH (v) RETURN labels(v) AS labels, count(v) AS count".to_string()
}

pub fn edge_type_counts() -> String {
    "MATCH ()-[e]->() RETURN type(e) AS type, count(e) AS count".to_string()
}

pub fn vertex_sample(label: &str) -> Result<String> {
    Ok(format!(
        "MATCH (v:{}) RETURN v AS object LIMIT 1",
        cypher_identifier(label)?
    ))
}

pub fn edge_sample(edge_type: &str) -> Result<String> {
    Ok(format!(
        "MATCH ()-[e:{}]->() RETURN e AS object LIMIT 1",
        cypher_identifier(edge_type)?
    ))
}

pub fn edge_connections() -> String {
    query!(
        "
        MATCH (source)-[e]->(target)
        RETURN DISTINCT labels(source) AS sourceLabels, type(e) AS type, labels(target) AS targetLabels
        "
    )
}

// ── Search & traversal ───────────────────────────────────────────

pub fn keyword_search(request: &KeywordSearchRequest) -> Result<String> {
    let mut conditions = Vec::new();
    conditions.extend(label_condition("v", &request.vertex_types)?);

    if let Some(term) = request.term() {
        let term = cypher_string(term);
        let operator = if request.exact_match { "=" } else { "CONTAINS" };
        if request.search_by_attributes.is_empty() {
            conditions.push(format!(
                "ANY(key IN keys(v) WHERE toString(v[key]) {operator} {term})"
            ));
        } else {
            let alternatives = request
                .search_by_attributes
                .iter()
                .map(|attr| -> Result<String> {
                    Ok(format!("v.{} {operator} {term}", cypher_identifier(attr)?))
                })
                .collect::<Result<Vec<_>>>()?
                .join(" OR ");
            conditions.push(format!("({alternatives})"));
        }
    }

    Ok(query!(
        "
        MATCH (v)
        {}
        RETURN v AS object
        {}
        {}
        ",
        where_clause(&conditions),
        skip(request.offset),
        limit(request.limit)
    ))
}

pub fn neighbors_count(request: &NeighborsCountRequest) -> Result<String> {
    Ok(query!(
        "
        MATCH (v)-[]-(neighbor)
        WHERE ID(v) = {}
        WITH DISTINCT neighbor
        {}
        RETURN labels(neighbor) AS vertexLabels, count(neighbor) AS count
        ",
        id_literal(&request.vertex_id),
        limit(request.limit)
    ))
}

pub fn neighbors(request: &NeighborsRequest) -> Result<String> {
    let source = format!("ID(v) = {}", id_literal(&request.vertex_id));
    let edge_condition = if request.edge_types.is_empty() {
        None
    } else {
        Some(format!(
            "type(e) IN [{}]",
            join_quoted(&request.edge_types, cypher_string)
        ))
    };

    let mut neighbor_conditions = vec![source.clone()];
    neighbor_conditions.extend(label_condition("neighbor", &request.vertex_types)?);
    neighbor_conditions.extend(edge_condition.clone());

    let mut edge_conditions = vec![source];
    edge_conditions.extend(edge_condition);

    Ok(query!(
        "
        MATCH (v)-[e]-(neighbor)
        {}
        WITH DISTINCT neighbor
        {}
        {}
        MATCH (v)-[e]-(neighbor)
        {}
        RETURN ID(neighbor) AS id, labels(neighbor) AS labels,
          collect(DISTINCT {id: ID(e), type: type(e), source: ID(startNode(e)), target: ID(endNode(e))}) AS edges
        ",
        where_clause(&neighbor_conditions),
        skip(request.offset),
        limit(request.limit),
        where_clause(&edge_conditions)
    ))
}

pub fn neighbor_predicates(request: &NeighborPredicatesRequest) -> Result<String> {
    if request.vertex_ids.is_empty() {
        return Err(QueryBuildError::EmptyBatch {
            operation: Operation::FetchNeighborPredicates,
            what: "vertex id",
        });
    }
    let ids = request
        .vertex_ids
        .iter()
        .map(id_literal::<VertexId>)
        .collect::<Vec<_>>()
        .join(", ");
    Ok(query!(
        "
        MATCH (v)-[e]->()
        WHERE ID(v) IN [{}]
        RETURN ID(v) AS id, type(e) AS type, \"outgoing\" AS direction, count(e) AS count
        UNION ALL
        MATCH (v)<-[e]-()
        WHERE ID(v) IN [{}]
        RETURN ID(v) AS id, type(e) AS type, \"incoming\" AS direction, count(e) AS count
        ",
        ids,
        ids
    ))
}

// ── Details ──────────────────────────────────────────────────────

pub fn vertex_details(request: &VertexDetailsRequest) -> Result<String> {
    Ok(query!(
        "
        MATCH (v)
        WHERE ID(v) = {}
        RETURN v AS object
        ",
        id_literal(&request.vertex_id)
    ))
}

pub fn edge_details(request: &EdgeDetailsRequest) -> Result<String> {
    Ok(query!(
        "
        MATCH ()-[e]->()
        WHERE ID(e) = {}
        RETURN e AS object
        ",
        id_literal(&request.edge_id)
    ))
}
