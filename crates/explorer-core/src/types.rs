//! Core entity model for the graph explorer.
//!
//! These types are the engine-agnostic view of a property or RDF graph:
//! every connector (Gremlin, openCypher, SPARQL) decodes its wire format
//! into them, and everything downstream only ever sees these.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ExplorerError;

// ── Engine ────────────────────────────────────────────────────────

/// The backend query engine a connection talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Engine {
    #[default]
    #[serde(rename = "gremlin", alias = "Gremlin")]
    Gremlin,
    #[serde(rename = "openCypher", alias = "opencypher", alias = "OpenCypher")]
    OpenCypher,
    #[serde(rename = "sparql", alias = "SPARQL", alias = "Sparql")]
    Sparql,
}

impl Engine {
    pub const ALL: [Engine; 3] = [Engine::Gremlin, Engine::OpenCypher, Engine::Sparql];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gremlin => "gremlin",
            Self::OpenCypher => "openCypher",
            Self::Sparql => "sparql",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gremlin" => Ok(Self::Gremlin),
            "opencypher" => Ok(Self::OpenCypher),
            "sparql" => Ok(Self::Sparql),
            _ => Err(ExplorerError::UnknownEngine(s.to_string())),
        }
    }
}

// ── Identity ──────────────────────────────────────────────────────

/// A backend-native identifier, as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    String(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RawId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RawId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for RawId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// Opaque identity of a vertex. Compares by raw value.
///
/// Build these through the connector's id codec so that every engine's
/// raw-id convention is applied consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(RawId);

impl VertexId {
    pub fn from_raw(raw: RawId) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &RawId {
        &self.0
    }

    pub fn into_raw(self) -> RawId {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identity of an edge. Compares by raw value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(RawId);

impl EdgeId {
    pub fn from_raw(raw: RawId) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &RawId {
        &self.0
    }

    pub fn into_raw(self) -> RawId {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Attributes ────────────────────────────────────────────────────

/// The inferred type of an attribute, as reported in the schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AttributeDataType {
    String,
    Number,
    Date,
    Boolean,
}

/// A scalar attribute value. Dates are kept distinct from strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Date(DateTime<Utc>),
    String(String),
}

impl AttributeValue {
    pub fn data_type(&self) -> AttributeDataType {
        match self {
            Self::Boolean(_) => AttributeDataType::Boolean,
            Self::Integer(_) | Self::Float(_) => AttributeDataType::Number,
            Self::Date(_) => AttributeDataType::Date,
            Self::String(_) => AttributeDataType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

// ── Entities ──────────────────────────────────────────────────────

/// Anything that can live in an [`EntityMap`].
pub trait Entity {
    type Id: Clone + Eq + Hash;

    fn id(&self) -> &Self::Id;

    /// True while only part of the entity's attributes are known.
    fn is_fragment(&self) -> bool;
}

/// A vertex (node, or RDF resource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vertex {
    pub id: VertexId,
    /// Labels, or `rdf:type` classes. Deduplicated, first-seen order.
    pub types: Vec<String>,
    pub attributes: Attributes,
    #[serde(rename = "__isFragment")]
    pub is_fragment: bool,
}

impl Vertex {
    /// The first type, used wherever a single display type is needed.
    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }
}

impl Entity for Vertex {
    type Id = VertexId;

    fn id(&self) -> &VertexId {
        &self.id
    }

    fn is_fragment(&self) -> bool {
        self.is_fragment
    }
}

/// A directed edge (relationship, or RDF statement between resources).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub source_id: VertexId,
    pub target_id: VertexId,
    pub attributes: Attributes,
    #[serde(rename = "__isFragment")]
    pub is_fragment: bool,
}

impl Entity for Edge {
    type Id = EdgeId;

    fn id(&self) -> &EdgeId {
        &self.id
    }

    fn is_fragment(&self) -> bool {
        self.is_fragment
    }
}

// ── EntityMap ─────────────────────────────────────────────────────

/// An insertion-ordered map of entities with unique keys.
///
/// Replacing the value of an existing key keeps its position, so a
/// fragment upgraded to its full entity stays where it was.
#[derive(Debug, Clone)]
pub struct EntityMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

pub type VertexMap = EntityMap<VertexId, Vertex>;
pub type EdgeMap = EntityMap<EdgeId, Edge>;

impl<K: Eq + Hash, V: PartialEq> PartialEq for EntityMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.index == other.index
    }
}

impl<K, V> Default for EntityMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash, V> EntityMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or replace. Returns the previous value for the key, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.index.get(key) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.entries.into_iter().map(|(_, v)| v)
    }
}

impl<V: Entity> EntityMap<V::Id, V> {
    /// Insert an entity under its own id.
    pub fn insert_entity(&mut self, entity: V) -> Option<V> {
        let key = entity.id().clone();
        self.insert(key, entity)
    }

    /// Ids of every entity still marked as a fragment.
    pub fn fragment_ids(&self) -> Vec<V::Id> {
        self.values()
            .filter(|v| v.is_fragment())
            .map(|v| v.id().clone())
            .collect()
    }
}

impl<V: Entity> FromIterator<V> for EntityMap<V::Id, V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<V: Entity> Extend<V> for EntityMap<V::Id, V> {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for entity in iter {
            self.insert_entity(entity);
        }
    }
}

impl<K, V> IntoIterator for EntityMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K, V: Serialize> Serialize for EntityMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (_, v) in &self.entries {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}

// ── Schema ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSchema {
    pub name: String,
    pub data_type: AttributeDataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexTypeSchema {
    #[serde(rename = "type")]
    pub vertex_type: String,
    pub total: u64,
    pub attributes: Vec<AttributeSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTypeSchema {
    #[serde(rename = "type")]
    pub edge_type: String,
    pub total: u64,
    pub attributes: Vec<AttributeSchema>,
}

/// One (source type) -[edge type]-> (target type) combination present in the data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeConnection {
    pub source_vertex_type: String,
    pub edge_type: String,
    pub target_vertex_type: String,
}

/// Everything known about the shape of a graph. Built once per connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub vertices: Vec<VertexTypeSchema>,
    pub edges: Vec<EdgeTypeSchema>,
    pub edge_connections: Vec<EdgeConnection>,
}

impl Schema {
    pub fn vertex_type(&self, name: &str) -> Option<&VertexTypeSchema> {
        self.vertices.iter().find(|v| v.vertex_type == name)
    }

    pub fn edge_type(&self, name: &str) -> Option<&EdgeTypeSchema> {
        self.edges.iter().find(|e| e.edge_type == name)
    }
}

// ── Neighbor summaries ────────────────────────────────────────────

/// How many distinct neighbors a vertex has, in total and per vertex type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborsCount {
    pub total: u64,
    pub counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// An edge type attached to a vertex, with how many edges of it there are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborPredicate {
    pub vertex_id: VertexId,
    pub edge_type: String,
    pub direction: Direction,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(id: &str, fragment: bool) -> Vertex {
        Vertex {
            id: VertexId::from_raw(id.into()),
            types: vec!["airport".to_string()],
            attributes: Attributes::new(),
            is_fragment: fragment,
        }
    }

    #[test]
    fn ids_compare_by_value() {
        let a = VertexId::from_raw(RawId::from("12"));
        let b = VertexId::from_raw(RawId::String("12".to_string()));
        assert_eq!(a, b);
        assert_ne!(a, VertexId::from_raw(RawId::Number(12)));
    }

    #[test]
    fn engine_parses_case_insensitively() {
        assert_eq!("OPENCYPHER".parse::<Engine>().unwrap(), Engine::OpenCypher);
        assert_eq!("sparql".parse::<Engine>().unwrap(), Engine::Sparql);
        assert!(matches!(
            "neo4j".parse::<Engine>(),
            Err(ExplorerError::UnknownEngine(_))
        ));
    }

    #[test]
    fn entity_map_replaces_in_place() {
        let mut map: VertexMap = [vertex("a", true), vertex("b", true), vertex("c", true)]
            .into_iter()
            .collect();

        let previous = map.insert_entity(vertex("b", false));
        assert!(previous.unwrap().is_fragment);

        let order: Vec<String> = map.keys().map(|k| k.to_string()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(
            map.fragment_ids(),
            vec![
                VertexId::from_raw("a".into()),
                VertexId::from_raw("c".into())
            ]
        );
    }

    #[test]
    fn entity_map_remove_keeps_order() {
        let mut map: VertexMap = [vertex("a", true), vertex("b", true), vertex("c", true)]
            .into_iter()
            .collect();

        map.remove(&VertexId::from_raw("a".into()));
        assert_eq!(map.len(), 2);
        assert!(map.get(&VertexId::from_raw("c".into())).is_some());
        let order: Vec<String> = map.keys().map(|k| k.to_string()).collect();
        assert_eq!(order, vec!["b", "c"]);
    }

    #[test]
    fn vertex_serializes_fragment_flag() {
        let json = serde_json::to_value(vertex("1", true)).unwrap();
        assert_eq!(json["__isFragment"], serde_json::Value::Bool(true));
        assert_eq!(json["id"], serde_json::Value::String("1".to_string()));
    }

    #[test]
    fn attribute_data_types() {
        assert_eq!(
            AttributeValue::from(3_i64).data_type(),
            AttributeDataType::Number
        );
        assert_eq!(
            AttributeValue::from(1.5).data_type(),
            AttributeDataType::Number
        );
        assert_eq!(
            AttributeValue::from("ATL").data_type(),
            AttributeDataType::String
        );
        assert_eq!(
            AttributeValue::from(Utc::now()).data_type(),
            AttributeDataType::Date
        );
    }
}
