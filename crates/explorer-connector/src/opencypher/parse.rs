//! openCypher response parsers.
//!
//! Responses are `{ "results": [row, ...] }` where each row is an object
//! keyed by the `RETURN` aliases. Nodes and relationships inside rows use
//! the `~id`/`~labels`/`~properties` and `~id`/`~type`/`~start`/`~end`/
//! `~properties` shapes.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use explorer_core::{Attributes, Direction, EdgeConnection, NeighborsCount, RawId};

use crate::error::{ParseError, ParseResult};
use crate::normalize::{add_count, json_attribute, RawEdge, RawNeighborPredicate, RawVertex};

#[derive(Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Response<T> {
    results: Vec<T>,
}

#[derive(Deserialize)]
struct Node {
    #[serde(rename = "~id")]
    id: Value,
    #[serde(rename = "~labels", default)]
    labels: Vec<String>,
    #[serde(rename = "~properties", default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize)]
struct Relationship {
    #[serde(rename = "~id")]
    id: Value,
    #[serde(rename = "~type")]
    edge_type: String,
    #[serde(rename = "~start")]
    start: Value,
    #[serde(rename = "~end")]
    end: Value,
    #[serde(rename = "~properties", default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct ObjectRow<T> {
    object: T,
}

#[derive(Deserialize)]
struct LabelCountRow {
    labels: Vec<String>,
    count: u64,
}

#[derive(Deserialize)]
struct TypeCountRow {
    #[serde(rename = "type")]
    edge_type: String,
    count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeConnectionRow {
    source_labels: Vec<String>,
    #[serde(rename = "type")]
    edge_type: String,
    target_labels: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborCountRow {
    vertex_labels: Vec<String>,
    count: u64,
}

#[derive(Deserialize)]
struct EdgeStub {
    id: Value,
    #[serde(rename = "type")]
    edge_type: String,
    source: Value,
    target: Value,
}

#[derive(Deserialize)]
struct NeighborRow {
    id: Value,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    edges: Vec<EdgeStub>,
}

#[derive(Deserialize)]
struct PredicateRow {
    id: Value,
    #[serde(rename = "type")]
    edge_type: String,
    direction: Direction,
    count: u64,
}

fn rows<T: DeserializeOwned>(response: &Value) -> ParseResult<Vec<T>> {
    Ok(Response::<T>::deserialize(response)?.results)
}

fn raw_id(value: &Value) -> ParseResult<RawId> {
    match value {
        Value::String(s) => Ok(RawId::String(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(RawId::Number)
            .ok_or_else(|| ParseError::shape(format!("id is not an integer: {n}"))),
        other => Err(ParseError::shape(format!("not an id: {other}"))),
    }
}

fn attributes(properties: &Map<String, Value>) -> ParseResult<Attributes> {
    let mut attributes = Attributes::new();
    for (name, value) in properties {
        if let Some(value) = json_attribute(value).map_err(ParseError::Shape)? {
            attributes.insert(name.clone(), value);
        }
    }
    Ok(attributes)
}

impl Node {
    fn into_raw(self) -> ParseResult<RawVertex> {
        let mut raw = RawVertex::new(raw_id(&self.id)?);
        for label in self.labels {
            raw.add_type(label);
        }
        raw.attributes = attributes(&self.properties)?;
        Ok(raw)
    }
}

impl Relationship {
    fn into_raw(self) -> ParseResult<RawEdge> {
        Ok(RawEdge {
            id: raw_id(&self.id)?,
            source: raw_id(&self.start)?,
            target: raw_id(&self.end)?,
            attributes: attributes(&self.properties)?,
            edge_type: self.edge_type,
        })
    }
}

// ── Schema ───────────────────────────────────────────────────────

/// Vertex counts per label. A vertex with several labels counts once
/// under each of them.
pub fn vertex_type_counts(response: &Value) -> ParseResult<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for row in rows::<LabelCountRow>(response)? {
        for label in &row.labels {
            add_count(&mut counts, label, row.count);
        }
    }
    Ok(counts)
}

pub fn edge_type_counts(response: &Value) -> ParseResult<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for row in rows::<TypeCountRow>(response)? {
        add_count(&mut counts, &row.edge_type, row.count);
    }
    Ok(counts)
}

pub fn vertex_object(response: &Value) -> ParseResult<Option<RawVertex>> {
    rows::<ObjectRow<Node>>(response)?
        .into_iter()
        .next()
        .map(|row| row.object.into_raw())
        .transpose()
}

pub fn edge_object(response: &Value) -> ParseResult<Option<RawEdge>> {
    rows::<ObjectRow<Relationship>>(response)?
        .into_iter()
        .next()
        .map(|row| row.object.into_raw())
        .transpose()
}

/// One connection per (source label, edge type, target label), deduplicated.
pub fn edge_connections(response: &Value) -> ParseResult<Vec<EdgeConnection>> {
    let mut connections = Vec::new();
    for row in rows::<EdgeConnectionRow>(response)? {
        for source in &row.source_labels {
            for target in &row.target_labels {
                let connection = EdgeConnection {
                    source_vertex_type: source.clone(),
                    edge_type: row.edge_type.clone(),
                    target_vertex_type: target.clone(),
                };
                if !connections.contains(&connection) {
                    connections.push(connection);
                }
            }
        }
    }
    Ok(connections)
}

// ── Search & traversal ───────────────────────────────────────────

pub fn keyword_search(response: &Value) -> ParseResult<Vec<RawVertex>> {
    rows::<ObjectRow<Node>>(response)?
        .into_iter()
        .map(|row| row.object.into_raw())
        .collect()
}

/// Each row is one distinct label set; the total counts neighbors, not labels.
pub fn neighbors_count(response: &Value) -> ParseResult<NeighborsCount> {
    let mut result = NeighborsCount::default();
    for row in rows::<NeighborCountRow>(response)? {
        result.total += row.count;
        for label in &row.vertex_labels {
            add_count(&mut result.counts, label, row.count);
        }
    }
    Ok(result)
}

pub fn neighbors(response: &Value) -> ParseResult<(Vec<RawVertex>, Vec<RawEdge>)> {
    let mut vertices = Vec::new();
    let mut edges = Vec::new();
    for row in rows::<NeighborRow>(response)? {
        let mut vertex = RawVertex::new(raw_id(&row.id)?);
        for label in row.labels {
            vertex.add_type(label);
        }
        vertices.push(vertex);
        for stub in row.edges {
            edges.push(RawEdge {
                id: raw_id(&stub.id)?,
                edge_type: stub.edge_type,
                source: raw_id(&stub.source)?,
                target: raw_id(&stub.target)?,
                attributes: Attributes::new(),
            });
        }
    }
    Ok((vertices, edges))
}

pub fn neighbor_predicates(response: &Value) -> ParseResult<Vec<RawNeighborPredicate>> {
    rows::<PredicateRow>(response)?
        .into_iter()
        .map(|row| -> ParseResult<RawNeighborPredicate> {
            Ok(RawNeighborPredicate {
                vertex: raw_id(&row.id)?,
                edge_type: row.edge_type,
                direction: row.direction,
                count: row.count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use explorer_core::AttributeValue;
    use serde_json::json;

    #[test]
    fn nodes_decode_labels_and_properties() {
        let response = json!({"results": [{"object": {
            "~id": "1",
            "~entityType": "node",
            "~labels": ["airport"],
            "~properties": {"code": "ATL", "runways": 5, "opened": "1925-09-15T00:00:00Z", "closed": null}
        }}]});
        let vertices = keyword_search(&response).unwrap();
        let vertex = &vertices[0];
        assert_eq!(vertex.id, RawId::from("1"));
        assert_eq!(vertex.types, vec!["airport"]);
        assert_eq!(vertex.attributes["code"], AttributeValue::from("ATL"));
        assert_eq!(vertex.attributes["runways"], AttributeValue::Integer(5));
        assert!(matches!(vertex.attributes["opened"], AttributeValue::Date(_)));
        assert!(!vertex.attributes.contains_key("closed"));
    }

    #[test]
    fn multi_label_vertices_count_under_each_label() {
        let response = json!({"results": [
            {"labels": ["airport", "hub"], "count": 2},
            {"labels": ["airport"], "count": 3}
        ]});
        let counts = vertex_type_counts(&response).unwrap();
        assert_eq!(counts["airport"], 5);
        assert_eq!(counts["hub"], 2);
    }

    #[test]
    fn neighbors_count_totals_rows() {
        let response = json!({"results": [
            {"vertexLabels": ["airport", "hub"], "count": 2},
            {"vertexLabels": ["country"], "count": 1}
        ]});
        let count = neighbors_count(&response).unwrap();
        assert_eq!(count.total, 3);
        assert_eq!(count.counts["hub"], 2);
        assert_eq!(neighbors_count(&json!({"results": []})).unwrap().total, 0);
    }

    #[test]
    fn relationships_and_edge_stubs() {
        let response = json!({"results": [{"object": {
            "~id": "e1", "~type": "route", "~start": "1", "~end": "2",
            "~properties": {"dist": 809.5}
        }}]});
        let edge = edge_object(&response).unwrap().unwrap();
        assert_eq!(edge.source, RawId::from("1"));
        assert_eq!(edge.attributes["dist"], AttributeValue::Float(809.5));

        let response = json!({"results": [{
            "id": "2", "labels": ["airport"],
            "edges": [{"id": "e1", "type": "route", "source": "1", "target": "2"}]
        }]});
        let (vertices, edges) = neighbors(&response).unwrap();
        assert_eq!(vertices[0].id, RawId::from("2"));
        assert_eq!(edges[0].target, RawId::from("2"));
    }

    #[test]
    fn edge_connections_expand_label_sets() {
        let response = json!({"results": [
            {"sourceLabels": ["airport", "hub"], "type": "route", "targetLabels": ["airport"]},
            {"sourceLabels": ["airport"], "type": "route", "targetLabels": ["airport"]}
        ]});
        assert_eq!(edge_connections(&response).unwrap().len(), 2);
    }

    #[test]
    fn shape_errors() {
        assert!(keyword_search(&json!({"rows": []})).is_err());
        assert!(keyword_search(&json!({"results": [{"object": {"~labels": []}}]})).is_err());
        assert!(neighbor_predicates(&json!({"results": [
            {"id": "1", "type": "route", "direction": "sideways", "count": 1}
        ]}))
        .is_err());
    }
}
