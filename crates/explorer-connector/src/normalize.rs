//! Entity normalizer: per-engine records in, `Vertex`/`Edge` out.
//!
//! Parsers produce [`RawVertex`]/[`RawEdge`] records carrying raw ids. The
//! normalizer runs every id through the engine's codec and stamps the
//! fragment flag from the operation that produced the record. The flag is
//! never inferred from how many attributes came back.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use explorer_core::{
    AttributeSchema, AttributeValue, Attributes, Direction, Edge, EdgeMap, Engine,
    NeighborPredicate, RawId, Vertex, VertexMap,
};

use crate::codec::IdCodec;
use crate::request::Operation;

/// A vertex as decoded from the wire, before identity normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVertex {
    pub id: RawId,
    pub types: Vec<String>,
    pub attributes: Attributes,
}

impl RawVertex {
    pub fn new(id: RawId) -> Self {
        Self {
            id,
            types: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Add a type unless it is already present.
    pub fn add_type(&mut self, vertex_type: impl Into<String>) {
        let vertex_type = vertex_type.into();
        if !self.types.contains(&vertex_type) {
            self.types.push(vertex_type);
        }
    }
}

/// An edge as decoded from the wire, before identity normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub id: RawId,
    pub edge_type: String,
    pub source: RawId,
    pub target: RawId,
    pub attributes: Attributes,
}

/// An edge type attached to a vertex, as decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNeighborPredicate {
    pub vertex: RawId,
    pub edge_type: String,
    pub direction: Direction,
    pub count: u64,
}

/// Whether an operation returns partial entities.
///
/// | Operation              | Fragment |
/// |------------------------|----------|
/// | keyword search         | yes      |
/// | neighbor expansion     | yes      |
/// | vertex / edge details  | no       |
pub fn is_fragment_operation(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::KeywordSearch | Operation::FetchNeighbors
    )
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    codec: IdCodec,
    fragment: bool,
}

impl Normalizer {
    pub fn new(engine: Engine, operation: Operation) -> Self {
        Self {
            codec: IdCodec::for_engine(engine),
            fragment: is_fragment_operation(operation),
        }
    }

    pub fn vertex(&self, raw: RawVertex) -> Vertex {
        Vertex {
            id: self.codec.to_vertex_id(raw.id),
            types: raw.types,
            attributes: raw.attributes,
            is_fragment: self.fragment,
        }
    }

    pub fn edge(&self, raw: RawEdge) -> Edge {
        Edge {
            id: self.codec.to_edge_id(raw.id),
            edge_type: raw.edge_type,
            source_id: self.codec.to_vertex_id(raw.source),
            target_id: self.codec.to_vertex_id(raw.target),
            attributes: raw.attributes,
            is_fragment: self.fragment,
        }
    }

    /// Normalize a batch, merging records that share an id: types are
    /// collected in first-seen order and attributes are unioned.
    pub fn vertices(&self, raws: impl IntoIterator<Item = RawVertex>) -> VertexMap {
        let mut map = VertexMap::new();
        for raw in raws {
            let vertex = self.vertex(raw);
            match map.get_mut(&vertex.id) {
                Some(existing) => merge_vertex(existing, vertex),
                None => {
                    map.insert_entity(vertex);
                }
            }
        }
        map
    }

    pub fn neighbor_predicate(&self, raw: RawNeighborPredicate) -> NeighborPredicate {
        NeighborPredicate {
            vertex_id: self.codec.to_vertex_id(raw.vertex),
            edge_type: raw.edge_type,
            direction: raw.direction,
            count: raw.count,
        }
    }

    pub fn edges(&self, raws: impl IntoIterator<Item = RawEdge>) -> EdgeMap {
        let mut map = EdgeMap::new();
        for raw in raws {
            let edge = self.edge(raw);
            match map.get_mut(&edge.id) {
                Some(existing) => {
                    for (name, value) in edge.attributes {
                        existing.attributes.entry(name).or_insert(value);
                    }
                }
                None => {
                    map.insert_entity(edge);
                }
            }
        }
        map
    }
}

fn merge_vertex(existing: &mut Vertex, incoming: Vertex) {
    for vertex_type in incoming.types {
        if !existing.types.contains(&vertex_type) {
            existing.types.push(vertex_type);
        }
    }
    for (name, value) in incoming.attributes {
        existing.attributes.entry(name).or_insert(value);
    }
}

// ── Value coercion shared by the JSON-based parsers ──────────────

/// Parse an ISO-8601 date-time string.
pub(crate) fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert an untyped JSON scalar into an attribute value.
///
/// Returns `Ok(None)` for `null`; arrays reduce to their first element.
pub(crate) fn json_attribute(value: &serde_json::Value) -> Result<Option<AttributeValue>, String> {
    use serde_json::Value;
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(AttributeValue::Boolean(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(AttributeValue::Integer(i))),
            None => n
                .as_f64()
                .map(|f| Some(AttributeValue::Float(f)))
                .ok_or_else(|| format!("number out of range: {n}")),
        },
        Value::String(s) => Ok(Some(match parse_datetime(s) {
            Some(dt) => AttributeValue::Date(dt),
            None => AttributeValue::String(s.clone()),
        })),
        Value::Array(items) => match items.first() {
            Some(first) => json_attribute(first),
            None => Ok(None),
        },
        Value::Object(_) => Err(format!("nested object is not a scalar attribute: {value}")),
    }
}

/// Infer the attribute list of a type from one sample entity.
pub(crate) fn attribute_schemas(attributes: &Attributes) -> Vec<AttributeSchema> {
    attributes
        .iter()
        .map(|(name, value)| AttributeSchema {
            name: name.clone(),
            data_type: value.data_type(),
        })
        .collect()
}

/// Merge per-label counts, adding up labels seen more than once.
pub(crate) fn add_count(counts: &mut BTreeMap<String, u64>, label: &str, count: u64) {
    *counts.entry(label.to_string()).or_insert(0) += count;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, types: &[&str]) -> RawVertex {
        let mut v = RawVertex::new(id.into());
        for t in types {
            v.add_type(*t);
        }
        v
    }

    #[test]
    fn fragment_flag_follows_operation() {
        let search = Normalizer::new(Engine::Gremlin, Operation::KeywordSearch);
        let details = Normalizer::new(Engine::Gremlin, Operation::VertexDetails);
        assert!(search.vertex(raw("1", &["airport"])).is_fragment);

        // A detail fetch with no attributes is still complete.
        let empty = details.vertex(raw("1", &["airport"]));
        assert!(empty.attributes.is_empty());
        assert!(!empty.is_fragment);
    }

    #[test]
    fn merges_multiple_types_for_one_resource() {
        let normalizer = Normalizer::new(Engine::Sparql, Operation::VertexDetails);
        let mut first = raw("http://ex.org/a", &["http://ex.org/Person"]);
        first
            .attributes
            .insert("name".to_string(), AttributeValue::from("Ada"));
        let second = raw("http://ex.org/a", &["http://ex.org/Scientist", "http://ex.org/Person"]);

        let map = normalizer.vertices([first, second]);
        assert_eq!(map.len(), 1);
        let vertex = map.values().next().unwrap();
        assert_eq!(
            vertex.types,
            vec!["http://ex.org/Person", "http://ex.org/Scientist"]
        );
        assert_eq!(vertex.attributes["name"], AttributeValue::from("Ada"));
    }

    #[test]
    fn ids_go_through_the_codec() {
        let normalizer = Normalizer::new(Engine::OpenCypher, Operation::FetchNeighbors);
        let edge = normalizer.edge(RawEdge {
            id: RawId::Number(9),
            edge_type: "route".to_string(),
            source: RawId::Number(1),
            target: RawId::from("2"),
            attributes: Attributes::new(),
        });
        assert_eq!(edge.id.raw(), &RawId::from("9"));
        assert_eq!(edge.source_id.raw(), &RawId::from("1"));
        assert!(edge.is_fragment);
    }

    #[test]
    fn json_attributes_coerce_dates() {
        let date = json_attribute(&serde_json::json!("2024-03-01T10:00:00Z"))
            .unwrap()
            .unwrap();
        assert!(matches!(date, AttributeValue::Date(_)));
        let plain = json_attribute(&serde_json::json!("2024")).unwrap().unwrap();
        assert_eq!(plain, AttributeValue::from("2024"));
        assert_eq!(json_attribute(&serde_json::json!(null)).unwrap(), None);
        assert!(json_attribute(&serde_json::json!({"a": 1})).is_err());
    }
}
