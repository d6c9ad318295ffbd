//! Identity codec: raw backend ids in, comparable `VertexId`/`EdgeId` out.
//!
//! Each engine has its own raw-id convention. Gremlin backends may use
//! numeric ids (GraphSON `g:Int64`), so numbers stay numbers there.
//! openCypher and SPARQL ids are strings, so a numeric raw id is folded
//! into its decimal string and `12` and `"12"` name the same entity.

use serde_json::Value;

use explorer_core::{EdgeId, Engine, RawId, VertexId};

/// Anything that wraps a raw id.
pub trait HasRawId {
    fn raw_id(&self) -> &RawId;
}

impl HasRawId for VertexId {
    fn raw_id(&self) -> &RawId {
        self.raw()
    }
}

impl HasRawId for EdgeId {
    fn raw_id(&self) -> &RawId {
        self.raw()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCodec {
    engine: Engine,
}

impl IdCodec {
    pub fn for_engine(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Apply the engine's raw-id convention.
    pub fn canonicalize(&self, raw: RawId) -> RawId {
        match (self.engine, raw) {
            (Engine::Gremlin, raw) => raw,
            (_, RawId::Number(n)) => RawId::String(n.to_string()),
            (_, raw) => raw,
        }
    }

    pub fn to_vertex_id(&self, raw: impl Into<RawId>) -> VertexId {
        VertexId::from_raw(self.canonicalize(raw.into()))
    }

    pub fn to_edge_id(&self, raw: impl Into<RawId>) -> EdgeId {
        EdgeId::from_raw(self.canonicalize(raw.into()))
    }

    /// The backend-native form of an id, for embedding into query text.
    pub fn get_raw_id<I: HasRawId>(&self, id: &I) -> RawId {
        self.canonicalize(id.raw_id().clone())
    }

    /// Read a raw id from an untyped JSON scalar.
    pub fn from_json(&self, value: &Value) -> Option<RawId> {
        let raw = match value {
            Value::String(s) => RawId::String(s.clone()),
            Value::Number(n) => RawId::Number(n.as_i64()?),
            _ => return None,
        };
        Some(self.canonicalize(raw))
    }
}

/// Synthesise the id of an RDF statement between two resources.
pub fn sparql_edge_id(subject: &str, predicate: &str, object: &str) -> String {
    format!("{subject}-[{predicate}]->{object}")
}

/// Split a synthesised statement id back into (subject, predicate, object).
///
/// `>` never occurs inside an IRI or a blank node label, so the last `]->`
/// always ends the predicate. The predicate starts after the last `-[`
/// before it: a subject containing `-[` decodes correctly, a predicate
/// containing `-[` does not.
pub fn decode_sparql_edge_id(id: &str) -> Option<(String, String, String)> {
    let arrow = id.rfind("]->")?;
    let object = &id[arrow + 3..];
    let head = &id[..arrow];
    let open = head.rfind("-[")?;
    let subject = &head[..open];
    let predicate = &head[open + 2..];
    if subject.is_empty() || predicate.is_empty() || object.is_empty() {
        return None;
    }
    Some((
        subject.to_string(),
        predicate.to_string(),
        object.to_string(),
    ))
}
