//! GraphSON v3 decoding.
//!
//! Typed values arrive as `{"@type": "g:Int64", "@value": 1}` wrappers,
//! nested arbitrarily. [`decode`] unwraps them recursively into a [`GValue`]
//! tree so the parsers never touch `@type`/`@value` themselves.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use explorer_core::{AttributeValue, Attributes, RawId};

use crate::error::{ParseError, ParseResult};

#[derive(Debug, Clone, PartialEq)]
pub enum GValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<GValue>),
    /// Key/value pairs in wire order. Keys need not be strings.
    Map(Vec<(GValue, GValue)>),
    Vertex(GVertex),
    Edge(GEdge),
    VertexProperty(Box<GValue>),
    Property { key: String, value: Box<GValue> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GVertex {
    pub id: RawId,
    pub label: String,
    /// Every value of every property, in wire order.
    pub properties: BTreeMap<String, Vec<GValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GEdge {
    pub id: RawId,
    pub label: String,
    pub out_v: RawId,
    pub in_v: RawId,
    pub properties: BTreeMap<String, GValue>,
}

#[derive(Deserialize)]
struct Typed {
    #[serde(rename = "@type")]
    ty: String,
    #[serde(rename = "@value")]
    value: Value,
}

#[derive(Deserialize)]
struct VertexBody {
    id: Value,
    label: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize)]
struct EdgeBody {
    id: Value,
    label: String,
    #[serde(rename = "outV")]
    out_v: Value,
    #[serde(rename = "inV")]
    in_v: Value,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize)]
struct VertexPropertyBody {
    value: Value,
}

#[derive(Deserialize)]
struct PropertyBody {
    key: String,
    value: Value,
}

#[derive(Deserialize)]
struct RelationIdentifier {
    #[serde(rename = "relationId")]
    relation_id: String,
}

/// Decode a GraphSON value tree.
pub fn decode(value: &Value) -> ParseResult<GValue> {
    match value {
        Value::Null => Ok(GValue::Null),
        Value::Bool(b) => Ok(GValue::Bool(*b)),
        Value::Number(n) => Ok(match n.as_i64() {
            Some(i) => GValue::Int(i),
            None => GValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(s) => Ok(GValue::String(s.clone())),
        Value::Array(items) => items.iter().map(decode).collect::<ParseResult<_>>().map(GValue::List),
        Value::Object(obj) if obj.contains_key("@type") => {
            let typed: Typed = serde_json::from_value(value.clone())?;
            decode_typed(&typed.ty, &typed.value)
        }
        Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| -> ParseResult<(GValue, GValue)> {
                Ok((GValue::String(k.clone()), decode(v)?))
            })
            .collect::<ParseResult<_>>()
            .map(GValue::Map),
    }
}

/// Largest list a `g:BulkSet` may expand to.
const MAX_BULK_SET_LEN: usize = 1 << 20;

fn decode_typed(ty: &str, value: &Value) -> ParseResult<GValue> {
    match ty {
        "g:Int32" | "g:Int64" => value
            .as_i64()
            .map(GValue::Int)
            .ok_or_else(|| ParseError::shape(format!("{ty} is not an integer: {value}"))),
        "g:Float" | "g:Double" => value
            .as_f64()
            .map(GValue::Float)
            .ok_or_else(|| ParseError::shape(format!("{ty} is not a number: {value}"))),
        "g:Date" | "g:Timestamp" => {
            let millis = value
                .as_i64()
                .ok_or_else(|| ParseError::shape(format!("{ty} is not epoch millis: {value}")))?;
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(GValue::Date)
                .ok_or_else(|| ParseError::shape(format!("{ty} out of range: {millis}")))
        }
        "g:UUID" | "g:T" | "g:Direction" => value
            .as_str()
            .map(|s| GValue::String(s.to_string()))
            .ok_or_else(|| ParseError::shape(format!("{ty} is not a string: {value}"))),
        "g:List" | "g:Set" => decode_items(ty, value).map(GValue::List),
        "g:BulkSet" => {
            let items = decode_items(ty, value)?;
            let mut expanded = Vec::new();
            for pair in items.chunks(2) {
                let [item, GValue::Int(bulk)] = pair else {
                    return Err(ParseError::shape("g:BulkSet is not value/count pairs"));
                };
                let total = usize::try_from(*bulk)
                    .ok()
                    .and_then(|n| expanded.len().checked_add(n))
                    .filter(|&total| total <= MAX_BULK_SET_LEN)
                    .ok_or_else(|| ParseError::shape(format!("g:BulkSet count out of range: {bulk}")))?;
                expanded.resize(total, item.clone());
            }
            Ok(GValue::List(expanded))
        }
        "g:Map" => {
            let items = decode_items(ty, value)?;
            if items.len() % 2 != 0 {
                return Err(ParseError::shape("g:Map has an odd number of entries"));
            }
            let mut pairs = Vec::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                pairs.push((k, v));
            }
            Ok(GValue::Map(pairs))
        }
        "g:Vertex" => {
            let body: VertexBody = serde_json::from_value(value.clone())?;
            let mut properties = BTreeMap::new();
            for (name, values) in &body.properties {
                let values = match decode(values)? {
                    GValue::List(items) => items,
                    single => vec![single],
                };
                properties.insert(name.clone(), values);
            }
            Ok(GValue::Vertex(GVertex {
                id: decode(&body.id)?.into_raw_id()?,
                label: body.label,
                properties,
            }))
        }
        "g:Edge" => {
            let body: EdgeBody = serde_json::from_value(value.clone())?;
            let mut properties = BTreeMap::new();
            for (name, property) in &body.properties {
                properties.insert(name.clone(), decode(property)?);
            }
            Ok(GValue::Edge(GEdge {
                id: decode(&body.id)?.into_raw_id()?,
                label: body.label,
                out_v: decode(&body.out_v)?.into_raw_id()?,
                in_v: decode(&body.in_v)?.into_raw_id()?,
                properties,
            }))
        }
        "g:VertexProperty" => {
            let body: VertexPropertyBody = serde_json::from_value(value.clone())?;
            Ok(GValue::VertexProperty(Box::new(decode(&body.value)?)))
        }
        "g:Property" => {
            let body: PropertyBody = serde_json::from_value(value.clone())?;
            Ok(GValue::Property {
                key: body.key,
                value: Box::new(decode(&body.value)?),
            })
        }
        "janusgraph:RelationIdentifier" => {
            let body: RelationIdentifier = serde_json::from_value(value.clone())?;
            Ok(GValue::String(body.relation_id))
        }
        other => Err(ParseError::shape(format!("unsupported GraphSON type {other}"))),
    }
}

fn decode_items(ty: &str, value: &Value) -> ParseResult<Vec<GValue>> {
    value
        .as_array()
        .ok_or_else(|| ParseError::shape(format!("{ty} does not wrap an array")))?
        .iter()
        .map(decode)
        .collect()
}

impl GValue {
    pub fn into_raw_id(self) -> ParseResult<RawId> {
        match self {
            Self::Int(n) => Ok(RawId::Number(n)),
            Self::String(s) => Ok(RawId::String(s)),
            other => Err(ParseError::shape(format!("not an id: {other:?}"))),
        }
    }

    pub fn into_list(self) -> ParseResult<Vec<GValue>> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(ParseError::shape(format!("expected a list, got {other:?}"))),
        }
    }

    pub fn into_string(self) -> ParseResult<String> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(ParseError::shape(format!("expected a string, got {other:?}"))),
        }
    }

    pub fn into_count(self) -> ParseResult<u64> {
        match self {
            Self::Int(n) if n >= 0 => Ok(n as u64),
            other => Err(ParseError::shape(format!("expected a count, got {other:?}"))),
        }
    }

    /// Pairs of a map. Anything else is a shape error.
    pub fn into_map(self) -> ParseResult<Vec<(GValue, GValue)>> {
        match self {
            Self::Map(pairs) => Ok(pairs),
            other => Err(ParseError::shape(format!("expected a map, got {other:?}"))),
        }
    }

    /// Map with string keys, for `project()` results.
    pub fn into_record(self) -> ParseResult<BTreeMap<String, GValue>> {
        self.into_map()?
            .into_iter()
            .map(|(k, v)| -> ParseResult<(String, GValue)> { Ok((k.into_string()?, v)) })
            .collect()
    }

    /// Convert to an attribute, unwrapping properties and reducing
    /// multi-valued lists to their first value. `None` for null/empty.
    pub fn into_attribute(self) -> ParseResult<Option<AttributeValue>> {
        match self {
            Self::Null => Ok(None),
            Self::Bool(b) => Ok(Some(AttributeValue::Boolean(b))),
            Self::Int(n) => Ok(Some(AttributeValue::Integer(n))),
            Self::Float(f) => Ok(Some(AttributeValue::Float(f))),
            Self::String(s) => Ok(Some(AttributeValue::String(s))),
            Self::Date(d) => Ok(Some(AttributeValue::Date(d))),
            Self::VertexProperty(value) => value.into_attribute(),
            Self::Property { value, .. } => value.into_attribute(),
            Self::List(items) => match items.into_iter().next() {
                Some(first) => first.into_attribute(),
                None => Ok(None),
            },
            other => Err(ParseError::shape(format!(
                "not a scalar attribute: {other:?}"
            ))),
        }
    }
}

impl GVertex {
    pub fn into_attributes(self) -> ParseResult<Attributes> {
        let mut attributes = Attributes::new();
        for (name, values) in self.properties {
            if let Some(value) = GValue::List(values).into_attribute()? {
                attributes.insert(name, value);
            }
        }
        Ok(attributes)
    }
}

impl GEdge {
    pub fn into_attributes(self) -> ParseResult<Attributes> {
        let mut attributes = Attributes::new();
        for (name, value) in self.properties {
            if let Some(value) = value.into_attribute()? {
                attributes.insert(name, value);
            }
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_nested_typed_values() {
        let value = json!({
            "@type": "g:List",
            "@value": [
                {"@type": "g:Int64", "@value": 7},
                {"@type": "g:Map", "@value": ["a", {"@type": "g:Double", "@value": 1.5}]}
            ]
        });
        let decoded = decode(&value).unwrap();
        assert_eq!(
            decoded,
            GValue::List(vec![
                GValue::Int(7),
                GValue::Map(vec![(GValue::String("a".into()), GValue::Float(1.5))]),
            ])
        );
    }

    #[test]
    fn vertex_property_lists_reduce_to_first_value() {
        let value = json!({
            "@type": "g:Vertex",
            "@value": {
                "id": {"@type": "g:Int64", "@value": 1},
                "label": "airport",
                "properties": {
                    "code": [
                        {"@type": "g:VertexProperty", "@value": {"id": 0, "label": "code", "value": "ATL"}},
                        {"@type": "g:VertexProperty", "@value": {"id": 1, "label": "code", "value": "KATL"}}
                    ],
                    "opened": [
                        {"@type": "g:VertexProperty", "@value": {"id": 2, "label": "opened", "value": {"@type": "g:Date", "@value": 0}}}
                    ]
                }
            }
        });
        let GValue::Vertex(vertex) = decode(&value).unwrap() else {
            panic!("expected a vertex");
        };
        assert_eq!(vertex.id, RawId::Number(1));
        let attributes = vertex.into_attributes().unwrap();
        assert_eq!(attributes["code"], AttributeValue::from("ATL"));
        assert!(matches!(attributes["opened"], AttributeValue::Date(_)));
    }

    #[test]
    fn bulk_sets_expand() {
        let value = json!({"@type": "g:BulkSet", "@value": ["x", {"@type": "g:Int64", "@value": 2}]});
        assert_eq!(
            decode(&value).unwrap(),
            GValue::List(vec![GValue::String("x".into()), GValue::String("x".into())])
        );
    }

    #[test]
    fn bulk_set_counts_are_bounded() {
        for bulk in [i64::MAX, -1] {
            let value = json!({"@type": "g:BulkSet", "@value": ["x", {"@type": "g:Int64", "@value": bulk}]});
            assert!(matches!(decode(&value), Err(ParseError::Shape(_))));
        }
        let two_halves = json!({"@type": "g:BulkSet", "@value": [
            "x", {"@type": "g:Int64", "@value": 1 << 19},
            "y", {"@type": "g:Int64", "@value": (1 << 19) + 1}
        ]});
        assert!(matches!(decode(&two_halves), Err(ParseError::Shape(_))));
    }

    #[test]
    fn unknown_types_are_shape_errors() {
        let value = json!({"@type": "g:Tree", "@value": []});
        assert!(matches!(decode(&value), Err(ParseError::Shape(_))));
        let missing_value = json!({"@type": "g:Int64"});
        assert!(decode(&missing_value).is_err());
    }

    #[test]
    fn janusgraph_relation_ids_become_strings() {
        let value = json!({"@type": "janusgraph:RelationIdentifier", "@value": {"relationId": "4r-6-2dx"}});
        assert_eq!(
            decode(&value).unwrap().into_raw_id().unwrap(),
            RawId::from("4r-6-2dx")
        );
    }
}
