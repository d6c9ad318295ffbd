//! SPARQL 1.1 query templates.
//!
//! Vertices are resources with at least one `rdf:type`, their types are the
//! classes, and their attributes are the literal-valued predicates. An edge
//! is a statement whose object is another resource.

use explorer_core::{Engine, RawId, VertexId};

use crate::codec::{decode_sparql_edge_id, HasRawId, IdCodec};
use crate::error::QueryBuildError;
use crate::query;
use crate::request::{
    EdgeDetailsRequest, KeywordSearchRequest, NeighborPredicatesRequest, NeighborsCountRequest,
    NeighborsRequest, Operation, VertexDetailsRequest,
};
use crate::template::{sparql_iri, sparql_string};

type Result<T> = std::result::Result<T, QueryBuildError>;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Blank node labels only mean something inside the response that
/// produced them.
fn resource(value: &str) -> Result<String> {
    if value.starts_with("_:") {
        return Err(QueryBuildError::BlankNodeReference(value.to_string()));
    }
    sparql_iri(value)
}

fn resource_of<I: HasRawId>(id: &I) -> Result<String> {
    match IdCodec::for_engine(Engine::Sparql).get_raw_id(id) {
        RawId::String(iri) => resource(&iri),
        RawId::Number(n) => resource(&n.to_string()),
    }
}

fn rdf_type() -> String {
    format!("<{RDF_TYPE}>")
}

fn iri_list(values: &[String]) -> Result<String> {
    Ok(values
        .iter()
        .map(|value| sparql_iri(value))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

/// `FILTER (?var IN (...))`, or nothing when `values` is empty.
fn in_filter(var: &str, values: &[String]) -> Result<String> {
    if values.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("FILTER (?{var} IN ({}))", iri_list(values)?))
}

fn paging(offset: u32, limit: u32) -> String {
    let mut lines = Vec::new();
    if offset > 0 {
        lines.push(format!("OFFSET {offset}"));
    }
    if limit > 0 {
        lines.push(format!("LIMIT {limit}"));
    }
    lines.join("\n")
}

// ── Schema ───────────────────────────────────────────────────────

pub fn class_counts() -> String {
    query!(
        "
        SELECT ?class (COUNT(?subject) AS ?count) {
          ?subject a ?class .
        }
        GROUP BY ?class
        "
    )
}

/// One sample literal per (class, predicate), for attribute inference.
pub fn class_attributes(classes: &[String]) -> Result<String> {
    if classes.is_empty() {
        return Err(QueryBuildError::EmptyBatch {
            operation: Operation::FetchSchema,
            what: "class",
        });
    }
    let values = classes
        .iter()
        .map(|class| sparql_iri(class))
        .collect::<Result<Vec<_>>>()?
        .join(" ");
    Ok(query!(
        "
        SELECT ?class ?pred (SAMPLE(?value) AS ?sample) {
          VALUES ?class { {} }
          ?subject a ?class .
          ?subject ?pred ?value .
          FILTER (isLiteral(?value))
        }
        GROUP BY ?class ?pred
        ",
        values
    ))
}

/// Statement counts per predicate linking two resources.
pub fn predicate_counts() -> String {
    query!(
        "
        SELECT ?pred (COUNT(?subject) AS ?count) {
          ?subject ?pred ?object .
          FILTER (isIRI(?object) && ?pred != {})
        }
        GROUP BY ?pred
        ",
        rdf_type()
    )
}

pub fn edge_connections() -> String {
    query!(
        "
        SELECT DISTINCT ?sourceClass ?pred ?targetClass {
          ?subject ?pred ?object .
          ?subject a ?sourceClass .
          ?object a ?targetClass .
          FILTER (?pred != {})
        }
        ",
        rdf_type()
    )
}

// ── Search & traversal ───────────────────────────────────────────

/// Subjects are paginated in an inner query, then every class and literal
/// of each page member is collected.
pub fn keyword_search(request: &KeywordSearchRequest) -> Result<String> {
    let mut filters = vec![in_filter("class", &request.vertex_types)?];
    if let Some(term) = request.term() {
        let term = sparql_string(term);
        filters.push("?subject ?pred ?value .".to_string());
        filters.push("FILTER (isLiteral(?value))".to_string());
        filters.push(in_filter("pred", &request.search_by_attributes)?);
        filters.push(if request.exact_match {
            format!("FILTER (STR(?value) = {term})")
        } else {
            format!("FILTER (CONTAINS(LCASE(STR(?value)), LCASE({term})))")
        });
    }

    Ok(query!(
        "
        SELECT ?subject ?class ?pred ?value {
          {
            SELECT DISTINCT ?subject {
              ?subject a ?class .
              {}
            }
            {}
          }
          ?subject a ?class .
          OPTIONAL {
            ?subject ?pred ?value .
            FILTER (isLiteral(?value))
          }
        }
        ",
        filters.join("\n"),
        paging(request.offset, request.limit)
    ))
}

/// Distinct neighbors per class. The limit caps the inner distinct
/// selection so the count never scans past it.
pub fn neighbors_count(request: &NeighborsCountRequest) -> Result<String> {
    let source = resource_of(&request.vertex_id)?;
    Ok(query!(
        "
        SELECT ?class (COUNT(?subject) AS ?count) {
          {
            SELECT DISTINCT ?subject ?class {
              { ?subject ?predicate {} . } UNION { {} ?predicate ?subject . }
              ?subject a ?class .
              FILTER (isIRI(?subject))
            }
            {}
          }
        }
        GROUP BY ?class
        ",
        source,
        source,
        paging(0, request.limit)
    ))
}

pub fn neighbors(request: &NeighborsRequest) -> Result<String> {
    let source = resource_of(&request.vertex_id)?;
    let class_filter = in_filter("class", &request.vertex_types)?;
    let pred_filter = in_filter("pred", &request.edge_types)?;
    let to_filter = in_filter("predToResource", &request.edge_types)?;
    let from_filter = in_filter("predFromResource", &request.edge_types)?;
    Ok(query!(
        "
        SELECT ?subject ?class ?predToResource ?predFromResource {
          {
            SELECT DISTINCT ?subject {
              { ?subject ?pred {} . } UNION { {} ?pred ?subject . }
              FILTER (isIRI(?subject) && ?pred != {})
              ?subject a ?class .
              {}
              {}
            }
            {}
          }
          ?subject a ?class .
          OPTIONAL {
            ?subject ?predToResource {} .
            {}
          }
          OPTIONAL {
            {} ?predFromResource ?subject .
            FILTER (?predFromResource != {})
            {}
          }
        }
        ",
        source,
        source,
        rdf_type(),
        class_filter,
        pred_filter,
        paging(request.offset, request.limit),
        source,
        to_filter,
        source,
        rdf_type(),
        from_filter
    ))
}

pub fn neighbor_predicates(request: &NeighborPredicatesRequest) -> Result<String> {
    if request.vertex_ids.is_empty() {
        return Err(QueryBuildError::EmptyBatch {
            operation: Operation::FetchNeighborPredicates,
            what: "vertex id",
        });
    }
    let subjects = request
        .vertex_ids
        .iter()
        .map(resource_of::<VertexId>)
        .collect::<Result<Vec<_>>>()?
        .join(" ");
    Ok(query!(
        "
        SELECT ?subject ?pred ?direction (COUNT(?other) AS ?count) {
          VALUES ?subject { {} }
          {
            ?subject ?pred ?other .
            FILTER (isIRI(?other) && ?pred != {})
            BIND (\"outgoing\" AS ?direction)
          }
          UNION
          {
            ?other ?pred ?subject .
            BIND (\"incoming\" AS ?direction)
          }
        }
        GROUP BY ?subject ?pred ?direction
        ",
        subjects,
        rdf_type()
    ))
}

// ── Details ──────────────────────────────────────────────────────

pub fn vertex_details(request: &VertexDetailsRequest) -> Result<String> {
    Ok(query!(
        "
        SELECT ?pred ?value {
          {} ?pred ?value .
          FILTER (isLiteral(?value) || ?pred = {})
        }
        ",
        resource_of(&request.vertex_id)?,
        rdf_type()
    ))
}

pub fn edge_details(request: &EdgeDetailsRequest) -> Result<String> {
    let id = IdCodec::for_engine(Engine::Sparql)
        .get_raw_id(&request.edge_id)
        .to_string();
    let (subject, predicate, object) =
        decode_sparql_edge_id(&id).ok_or_else(|| QueryBuildError::MalformedEdgeId(id.clone()))?;
    let subject = resource(&subject)?;
    let object = resource(&object)?;
    Ok(query!(
        "
        SELECT ?sourceClass ?targetClass {
          {} {} {} .
          OPTIONAL { {} a ?sourceClass . }
          OPTIONAL { {} a ?targetClass . }
        }
        LIMIT 1
        ",
        subject,
        sparql_iri(&predicate)?,
        object,
        subject,
        object
    ))
}
