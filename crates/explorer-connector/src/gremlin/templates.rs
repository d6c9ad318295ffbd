//! Gremlin query templates.

use explorer_core::{Engine, RawId, VertexId};

use crate::codec::{HasRawId, IdCodec};
use crate::error::QueryBuildError;
use crate::query;
use crate::request::{
    EdgeDetailsRequest, KeywordSearchRequest, NeighborPredicatesRequest, NeighborsCountRequest,
    NeighborsRequest, Operation, VertexDetailsRequest,
};
use crate::template::{gremlin_string, join_quoted};

type Result<T> = std::result::Result<T, QueryBuildError>;

/// Numeric ids render as long literals, string ids as quoted strings.
pub fn id_literal(raw: &RawId) -> String {
    match raw {
        RawId::Number(n) => format!("{n}L"),
        RawId::String(s) => gremlin_string(s),
    }
}

fn id_of<I: HasRawId>(id: &I) -> String {
    id_literal(&IdCodec::for_engine(Engine::Gremlin).get_raw_id(id))
}

/// `.skip(n)` and `.limit(n)` steps; each omitted when zero.
fn paging(offset: u32, limit: u32) -> String {
    let mut steps = String::new();
    if offset > 0 {
        steps.push_str(&format!(".skip({offset})"));
    }
    if limit > 0 {
        steps.push_str(&format!(".limit({limit})"));
    }
    steps
}

fn has_label(types: &[String]) -> String {
    if types.is_empty() {
        String::new()
    } else {
        format!(".hasLabel({})", join_quoted(types, gremlin_string))
    }
}

// ── Schema ───────────────────────────────────────────────────────

pub fn vertex_type_counts() -> String {
    "g.V().groupCount().by(label)".to_string()
}

pub fn edge_type_counts() -> String {
    "g.E().groupCount().by(label)".to_string()
}

fn samples(step: &str, types: &[String]) -> Result<String> {
    if types.is_empty() {
        return Err(QueryBuildError::EmptyBatch {
            operation: Operation::FetchSchema,
            what: "type",
        });
    }
    let branches = types
        .iter()
        .map(|t| format!("__.{step}().hasLabel({}).limit(1)", gremlin_string(t)))
        .collect::<Vec<_>>()
        .join(",\n");
    Ok(query!(
        "
        g.inject(0).union(
          {}
        ).fold()
        ",
        branches
    ))
}

/// One sample vertex per label, for attribute inference.
pub fn vertex_samples(types: &[String]) -> Result<String> {
    samples("V", types)
}

/// One sample edge per label, for attribute inference.
pub fn edge_samples(types: &[String]) -> Result<String> {
    samples("E", types)
}

pub fn edge_connections() -> String {
    query!(
        "
        g.E()
          .project(\"source\", \"edge\", \"target\")
          .by(__.outV().label())
          .by(label)
          .by(__.inV().label())
          .dedup()
        "
    )
}

// ── Search & traversal ───────────────────────────────────────────

pub fn keyword_search(request: &KeywordSearchRequest) -> Result<String> {
    let value_filter = match request.term() {
        None => String::new(),
        Some(term) => {
            let predicate = if request.exact_match {
                gremlin_string(term)
            } else {
                format!("TextP.containing({})", gremlin_string(term))
            };
            if request.search_by_attributes.is_empty() {
                format!(".where(__.properties().hasValue({predicate}))")
            } else {
                let clauses = request
                    .search_by_attributes
                    .iter()
                    .map(|attr| format!("__.has({}, {predicate})", gremlin_string(attr)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(".or({clauses})")
            }
        }
    };

    Ok(query!(
        "
        g.V()
          {}
          {}
          {}
        ",
        has_label(&request.vertex_types),
        value_filter,
        paging(request.offset, request.limit)
    ))
}

pub fn neighbors_count(request: &NeighborsCountRequest) -> Result<String> {
    Ok(query!(
        "
        g.V({})
          .both()
          .dedup()
          {}
          .groupCount()
          .by(label)
        ",
        id_of(&request.vertex_id),
        paging(0, request.limit)
    ))
}

pub fn neighbors(request: &NeighborsRequest) -> Result<String> {
    let source = id_of(&request.vertex_id);
    let edge_labels = join_quoted(&request.edge_types, gremlin_string);
    Ok(query!(
        "
        g.V({})
          .both({})
          {}
          .dedup()
          {}
          .project(\"vertex\", \"edges\")
          .by(__.project(\"id\", \"label\").by(id).by(label))
          .by(
            __.bothE({})
              .where(__.otherV().hasId({}))
              .project(\"id\", \"label\", \"outV\", \"inV\")
              .by(id)
              .by(label)
              .by(__.outV().id())
              .by(__.inV().id())
              .fold()
          )
        ",
        source,
        edge_labels,
        has_label(&request.vertex_types),
        paging(request.offset, request.limit),
        edge_labels,
        source
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
        .map(id_of::<VertexId>)
        .collect::<Vec<_>>()
        .join(", ");
    Ok(query!(
        "
        g.V({})
          .project(\"id\", \"out\", \"in\")
          .by(id)
          .by(__.outE().groupCount().by(label))
          .by(__.inE().groupCount().by(label))
        ",
        ids
    ))
}

// ── Details ──────────────────────────────────────────────────────

pub fn vertex_details(request: &VertexDetailsRequest) -> Result<String> {
    Ok(format!("g.V({})", id_of(&request.vertex_id)))
}

pub fn edge_details(request: &EdgeDetailsRequest) -> Result<String> {
    Ok(format!("g.E({})", id_of(&request.edge_id)))
}
