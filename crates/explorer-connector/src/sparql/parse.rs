//! SPARQL JSON Results parsers.
//!
//! `{ "head": { "vars": [...] }, "results": { "bindings": [row, ...] } }`,
//! where each row maps a variable to an RDF term. Unbound variables are
//! simply absent from the row.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use explorer_core::{AttributeValue, Attributes, Direction, EdgeConnection, NeighborsCount, RawId};

use super::templates::RDF_TYPE;
use crate::codec::sparql_edge_id;
use crate::error::{ParseError, ParseResult};
use crate::normalize::{add_count, parse_datetime, RawEdge, RawNeighborPredicate, RawVertex};

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Term {
    Uri {
        value: String,
    },
    Bnode {
        value: String,
    },
    Literal {
        value: String,
        #[serde(default)]
        datatype: Option<String>,
    },
    TypedLiteral {
        value: String,
        datatype: String,
    },
}

type Row = HashMap<String, Term>;

#[derive(Deserialize)]
struct Response {
    results: Results,
}

#[derive(Deserialize)]
struct Results {
    bindings: Vec<Row>,
}

impl Term {
    /// The id of a resource term. Blank nodes keep their `_:` prefix so
    /// they are never mistaken for IRIs.
    pub fn resource(&self) -> ParseResult<String> {
        match self {
            Self::Uri { value } => Ok(value.clone()),
            Self::Bnode { value } if value.starts_with("_:") => Ok(value.clone()),
            Self::Bnode { value } => Ok(format!("_:{value}")),
            other => Err(ParseError::shape(format!("expected a resource, got {other:?}"))),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal { .. } | Self::TypedLiteral { .. })
    }

    /// Coerce a literal by its XSD datatype. Anything unrecognised or
    /// unparsable stays a string.
    pub fn attribute(&self) -> ParseResult<AttributeValue> {
        match self {
            Self::Literal { value, datatype } => Ok(coerce(value, datatype.as_deref())),
            Self::TypedLiteral { value, datatype } => Ok(coerce(value, Some(datatype))),
            other => Err(ParseError::shape(format!("expected a literal, got {other:?}"))),
        }
    }

    pub fn count(&self) -> ParseResult<u64> {
        let value = match self {
            Self::Literal { value, .. } | Self::TypedLiteral { value, .. } => value,
            other => return Err(ParseError::shape(format!("expected a count, got {other:?}"))),
        };
        value
            .parse()
            .map_err(|_| ParseError::shape(format!("count is not an integer: {value}")))
    }

    fn lexical(&self) -> &str {
        match self {
            Self::Uri { value }
            | Self::Bnode { value }
            | Self::Literal { value, .. }
            | Self::TypedLiteral { value, .. } => value,
        }
    }
}

fn coerce(value: &str, datatype: Option<&str>) -> AttributeValue {
    let fallback = || AttributeValue::String(value.to_string());
    let Some(local) = datatype.and_then(|d| d.strip_prefix(XSD)) else {
        return fallback();
    };
    let coerced = match local {
        "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "nonPositiveInteger" | "negativeInteger" | "unsignedLong"
        | "unsignedInt" | "unsignedShort" | "unsignedByte" => {
            value.parse().ok().map(AttributeValue::Integer)
        }
        "decimal" | "double" | "float" => value.parse().ok().map(AttributeValue::Float),
        "boolean" => match value {
            "true" | "1" => Some(AttributeValue::Boolean(true)),
            "false" | "0" => Some(AttributeValue::Boolean(false)),
            _ => None,
        },
        "dateTime" => parse_datetime(value).map(AttributeValue::Date),
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| AttributeValue::Date(dt.and_utc())),
        _ => None,
    };
    coerced.unwrap_or_else(fallback)
}

fn bindings(response: &Value) -> ParseResult<Vec<Row>> {
    Ok(Response::deserialize(response)?.results.bindings)
}

fn var<'a>(row: &'a Row, name: &str) -> ParseResult<&'a Term> {
    row.get(name)
        .ok_or_else(|| ParseError::shape(format!("unbound variable ?{name}")))
}

// ── Schema ───────────────────────────────────────────────────────

/// Counts keyed by the resource bound to `key` (`class` or `pred`).
pub fn resource_counts(response: &Value, key: &str) -> ParseResult<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for row in bindings(response)? {
        add_count(&mut counts, &var(&row, key)?.resource()?, var(&row, "count")?.count()?);
    }
    Ok(counts)
}

/// Sample literal per (class, predicate) pair, grouped by class.
pub fn class_attributes(response: &Value) -> ParseResult<BTreeMap<String, Attributes>> {
    let mut classes: BTreeMap<String, Attributes> = BTreeMap::new();
    for row in bindings(response)? {
        let Some(sample) = row.get("sample") else {
            continue;
        };
        classes
            .entry(var(&row, "class")?.resource()?)
            .or_default()
            .insert(var(&row, "pred")?.resource()?, sample.attribute()?);
    }
    Ok(classes)
}

pub fn edge_connections(response: &Value) -> ParseResult<Vec<EdgeConnection>> {
    bindings(response)?
        .into_iter()
        .map(|row| -> ParseResult<EdgeConnection> {
            Ok(EdgeConnection {
                source_vertex_type: var(&row, "sourceClass")?.resource()?,
                edge_type: var(&row, "pred")?.resource()?,
                target_vertex_type: var(&row, "targetClass")?.resource()?,
            })
        })
        .collect()
}

// ── Search & traversal ───────────────────────────────────────────

/// One row per (subject, class, literal); subjects are grouped in
/// first-seen order with the first value of each predicate kept.
pub fn keyword_search(response: &Value) -> ParseResult<Vec<RawVertex>> {
    let mut vertices: Vec<RawVertex> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in bindings(response)? {
        let subject = var(&row, "subject")?.resource()?;
        let position = *index.entry(subject.clone()).or_insert_with(|| {
            vertices.push(RawVertex::new(RawId::String(subject)));
            vertices.len() - 1
        });
        let vertex = &mut vertices[position];
        if let Some(class) = row.get("class") {
            vertex.add_type(class.resource()?);
        }
        if let (Some(pred), Some(value)) = (row.get("pred"), row.get("value")) {
            if value.is_literal() {
                let pred = pred.resource()?;
                if !vertex.attributes.contains_key(&pred) {
                    vertex.attributes.insert(pred, value.attribute()?);
                }
            }
        }
    }
    Ok(vertices)
}

/// Per-class counts. A neighbor with several classes is counted under
/// each, and the total is the sum over classes.
pub fn neighbors_count(response: &Value) -> ParseResult<NeighborsCount> {
    let counts = resource_counts(response, "class")?;
    Ok(NeighborsCount {
        total: counts.values().sum(),
        counts,
    })
}

/// Neighbors with their classes, plus a synthesised edge for every
/// predicate connecting them to `source`.
pub fn neighbors(source: &str, response: &Value) -> ParseResult<(Vec<RawVertex>, Vec<RawEdge>)> {
    let mut vertices: Vec<RawVertex> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut edges: Vec<RawEdge> = Vec::new();

    let mut add_edge = |subject: &str, predicate: &str, object: &str| {
        let id = RawId::String(sparql_edge_id(subject, predicate, object));
        if !edges.iter().any(|e| e.id == id) {
            edges.push(RawEdge {
                id,
                edge_type: predicate.to_string(),
                source: RawId::from(subject),
                target: RawId::from(object),
                attributes: Attributes::new(),
            });
        }
    };

    for row in bindings(response)? {
        let subject = var(&row, "subject")?.resource()?;
        let position = *index.entry(subject.clone()).or_insert_with(|| {
            vertices.push(RawVertex::new(RawId::String(subject.clone())));
            vertices.len() - 1
        });
        if let Some(class) = row.get("class") {
            vertices[position].add_type(class.resource()?);
        }
        if let Some(pred) = row.get("predToResource") {
            add_edge(&subject, &pred.resource()?, source);
        }
        if let Some(pred) = row.get("predFromResource") {
            add_edge(source, &pred.resource()?, &subject);
        }
    }
    Ok((vertices, edges))
}

pub fn neighbor_predicates(response: &Value) -> ParseResult<Vec<RawNeighborPredicate>> {
    bindings(response)?
        .into_iter()
        .map(|row| -> ParseResult<RawNeighborPredicate> {
            let direction = match var(&row, "direction")?.lexical() {
                "outgoing" => Direction::Outgoing,
                "incoming" => Direction::Incoming,
                other => return Err(ParseError::shape(format!("unknown direction {other:?}"))),
            };
            Ok(RawNeighborPredicate {
                vertex: RawId::String(var(&row, "subject")?.resource()?),
                edge_type: var(&row, "pred")?.resource()?,
                direction,
                count: var(&row, "count")?.count()?,
            })
        })
        .collect()
}

// ── Details ──────────────────────────────────────────────────────

/// `None` when the resource has neither a type nor a literal.
pub fn vertex_details(resource: &str, response: &Value) -> ParseResult<Option<RawVertex>> {
    let rows = bindings(response)?;
    if rows.is_empty() {
        return Ok(None);
    }
    let mut vertex = RawVertex::new(RawId::from(resource));
    for row in rows {
        let pred = var(&row, "pred")?.resource()?;
        let value = var(&row, "value")?;
        if pred == RDF_TYPE {
            vertex.add_type(value.resource()?);
        } else if !vertex.attributes.contains_key(&pred) {
            vertex.attributes.insert(pred, value.attribute()?);
        }
    }
    Ok(Some(vertex))
}

/// `None` when the statement does not exist.
pub fn edge_details(
    (subject, predicate, object): (&str, &str, &str),
    response: &Value,
) -> ParseResult<Option<RawEdge>> {
    if bindings(response)?.is_empty() {
        return Ok(None);
    }
    Ok(Some(RawEdge {
        id: RawId::String(sparql_edge_id(subject, predicate, object)),
        edge_type: predicate.to_string(),
        source: RawId::from(subject),
        target: RawId::from(object),
        attributes: Attributes::new(),
    }))
}
