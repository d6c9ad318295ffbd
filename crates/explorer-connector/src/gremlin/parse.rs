//! Gremlin response parsers.
//!
//! Every response is `{ "result": { "data": <GraphSON list> } }`. The data is
//! decoded into a [`GValue`] tree first, so the functions here only walk
//! typed values.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use explorer_core::{Direction, EdgeConnection, NeighborsCount};

use super::graphson::{self, GEdge, GValue, GVertex};
use crate::error::{ParseError, ParseResult};
use crate::normalize::{add_count, RawEdge, RawNeighborPredicate, RawVertex};

#[derive(Deserialize)]
struct Envelope {
    result: ResultBody,
}

#[derive(Deserialize)]
struct ResultBody {
    data: Value,
}

/// Items of the result list.
pub fn data(response: &Value) -> ParseResult<Vec<GValue>> {
    let envelope = Envelope::deserialize(response)?;
    match graphson::decode(&envelope.result.data)? {
        GValue::List(items) => Ok(items),
        GValue::Null => Ok(Vec::new()),
        single => Ok(vec![single]),
    }
}

pub fn raw_vertex(vertex: GVertex) -> ParseResult<RawVertex> {
    let mut raw = RawVertex::new(vertex.id.clone());
    raw.add_type(vertex.label.clone());
    raw.attributes = vertex.into_attributes()?;
    Ok(raw)
}

pub fn raw_edge(edge: GEdge) -> ParseResult<RawEdge> {
    Ok(RawEdge {
        id: edge.id.clone(),
        edge_type: edge.label.clone(),
        source: edge.out_v.clone(),
        target: edge.in_v.clone(),
        attributes: edge.into_attributes()?,
    })
}

fn expect_vertex(value: GValue) -> ParseResult<GVertex> {
    match value {
        GValue::Vertex(vertex) => Ok(vertex),
        other => Err(ParseError::shape(format!("expected a vertex, got {other:?}"))),
    }
}

fn expect_edge(value: GValue) -> ParseResult<GEdge> {
    match value {
        GValue::Edge(edge) => Ok(edge),
        other => Err(ParseError::shape(format!("expected an edge, got {other:?}"))),
    }
}

fn field(record: &mut BTreeMap<String, GValue>, name: &str) -> ParseResult<GValue> {
    record
        .remove(name)
        .ok_or_else(|| ParseError::shape(format!("missing field {name:?}")))
}

/// A `groupCount().by(label)` result: exactly one map of label to count.
pub fn group_count(response: &Value) -> ParseResult<BTreeMap<String, u64>> {
    let Some(first) = data(response)?.into_iter().next() else {
        return Err(ParseError::Empty);
    };
    label_counts(first)
}

fn label_counts(value: GValue) -> ParseResult<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for (label, count) in value.into_map()? {
        add_count(&mut counts, &label.into_string()?, count.into_count()?);
    }
    Ok(counts)
}

// ── Schema ───────────────────────────────────────────────────────

/// Sample elements from a folded union, flattened.
fn folded(response: &Value) -> ParseResult<Vec<GValue>> {
    let mut items = Vec::new();
    for item in data(response)? {
        match item {
            GValue::List(inner) => items.extend(inner),
            other => items.push(other),
        }
    }
    Ok(items)
}

pub fn vertex_samples(response: &Value) -> ParseResult<Vec<RawVertex>> {
    folded(response)?
        .into_iter()
        .map(|item| -> ParseResult<RawVertex> { raw_vertex(expect_vertex(item)?) })
        .collect()
}

pub fn edge_samples(response: &Value) -> ParseResult<Vec<RawEdge>> {
    folded(response)?
        .into_iter()
        .map(|item| -> ParseResult<RawEdge> { raw_edge(expect_edge(item)?) })
        .collect()
}

pub fn edge_connections(response: &Value) -> ParseResult<Vec<EdgeConnection>> {
    data(response)?
        .into_iter()
        .map(|item| -> ParseResult<EdgeConnection> {
            let mut record = item.into_record()?;
            Ok(EdgeConnection {
                source_vertex_type: field(&mut record, "source")?.into_string()?,
                edge_type: field(&mut record, "edge")?.into_string()?,
                target_vertex_type: field(&mut record, "target")?.into_string()?,
            })
        })
        .collect()
}

// ── Search & traversal ───────────────────────────────────────────

pub fn keyword_search(response: &Value) -> ParseResult<Vec<RawVertex>> {
    data(response)?
        .into_iter()
        .map(|item| -> ParseResult<RawVertex> { raw_vertex(expect_vertex(item)?) })
        .collect()
}

pub fn neighbors_count(response: &Value) -> ParseResult<NeighborsCount> {
    let counts = group_count(response)?;
    Ok(NeighborsCount {
        total: counts.values().sum(),
        counts,
    })
}

/// `project("vertex", "edges")` rows: a neighbor stub plus the edges that
/// connect it to the source vertex.
pub fn neighbors(response: &Value) -> ParseResult<(Vec<RawVertex>, Vec<RawEdge>)> {
    let mut vertices = Vec::new();
    let mut edges = Vec::new();
    for item in data(response)? {
        let mut record = item.into_record()?;

        let mut stub = field(&mut record, "vertex")?.into_record()?;
        let mut vertex = RawVertex::new(field(&mut stub, "id")?.into_raw_id()?);
        vertex.add_type(field(&mut stub, "label")?.into_string()?);
        vertices.push(vertex);

        for edge in field(&mut record, "edges")?.into_list()? {
            let mut edge = edge.into_record()?;
            edges.push(RawEdge {
                id: field(&mut edge, "id")?.into_raw_id()?,
                edge_type: field(&mut edge, "label")?.into_string()?,
                source: field(&mut edge, "outV")?.into_raw_id()?,
                target: field(&mut edge, "inV")?.into_raw_id()?,
                attributes: Default::default(),
            });
        }
    }
    Ok((vertices, edges))
}

pub fn neighbor_predicates(response: &Value) -> ParseResult<Vec<RawNeighborPredicate>> {
    let mut predicates = Vec::new();
    for item in data(response)? {
        let mut record = item.into_record()?;
        let vertex = field(&mut record, "id")?.into_raw_id()?;
        for (key, direction) in [("out", Direction::Outgoing), ("in", Direction::Incoming)] {
            for (edge_type, count) in label_counts(field(&mut record, key)?)? {
                predicates.push(RawNeighborPredicate {
                    vertex: vertex.clone(),
                    edge_type,
                    direction,
                    count,
                });
            }
        }
    }
    Ok(predicates)
}

// ── Details ──────────────────────────────────────────────────────

pub fn vertex_details(response: &Value) -> ParseResult<Option<RawVertex>> {
    data(response)?
        .into_iter()
        .next()
        .map(|item| -> ParseResult<RawVertex> { raw_vertex(expect_vertex(item)?) })
        .transpose()
}

pub fn edge_details(response: &Value) -> ParseResult<Option<RawEdge>> {
    data(response)?
        .into_iter()
        .next()
        .map(|item| -> ParseResult<RawEdge> { raw_edge(expect_edge(item)?) })
        .transpose()
}
