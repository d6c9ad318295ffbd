//! Engine connector facade.
//!
//! A [`Connector`] owns the engine choice and the injected transport. Each
//! engine contributes a static [`EngineDriver`]: one query builder and one
//! response parser per operation, plus its schema discovery flow. The
//! facade runs build → transport → parse → normalize for every operation
//! the same way.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use explorer_core::{
    Edge, EdgeConnection, EdgeMap, Engine, NeighborPredicate, NeighborsCount, Schema, Vertex,
    VertexMap,
};

use crate::codec::IdCodec;
use crate::error::{ConnectorError, ParseResult, QueryBuildError, Result};
use crate::normalize::{Normalizer, RawEdge, RawNeighborPredicate, RawVertex};
use crate::request::{
    EdgeDetailsRequest, KeywordSearchRequest, NeighborPredicatesRequest, NeighborsCountRequest,
    NeighborsRequest, Operation, QueryRequest, VertexDetailsRequest,
};
use crate::transport::Transport;
use crate::{gremlin, opencypher, sparql};

// ── Drivers ──────────────────────────────────────────────────────

/// The builder/parser pair of one operation.
pub(crate) struct Op<R, T> {
    pub build: fn(&R) -> std::result::Result<String, QueryBuildError>,
    pub parse: fn(&R, &Value) -> ParseResult<T>,
}

/// Everything engine-specific, as plain function pointers.
pub(crate) struct EngineDriver {
    /// The schema queries that need no prior response, for rendering.
    pub schema_queries: fn() -> Vec<String>,
    pub fetch_schema: for<'a> fn(&'a Connector) -> BoxFuture<'a, Result<Schema>>,
    pub keyword_search: Op<KeywordSearchRequest, Vec<RawVertex>>,
    pub neighbors_count: Op<NeighborsCountRequest, NeighborsCount>,
    pub neighbors: Op<NeighborsRequest, (Vec<RawVertex>, Vec<RawEdge>)>,
    pub neighbor_predicates: Op<NeighborPredicatesRequest, Vec<RawNeighborPredicate>>,
    pub vertex_details: Op<VertexDetailsRequest, Option<RawVertex>>,
    pub edge_details: Op<EdgeDetailsRequest, Option<RawEdge>>,
    pub edge_connections: Op<(), Vec<EdgeConnection>>,
}

// ── Responses ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct KeywordSearchResponse {
    pub vertices: VertexMap,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NeighborsResponse {
    pub vertices: VertexMap,
    pub edges: EdgeMap,
}

/// The normalized result of any single-query operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operation", content = "result", rename_all = "camelCase")]
pub enum QueryResponse {
    KeywordSearch(KeywordSearchResponse),
    NeighborsCount(NeighborsCount),
    Neighbors(NeighborsResponse),
    NeighborPredicates(Vec<NeighborPredicate>),
    VertexDetails(Option<Vertex>),
    EdgeDetails(Option<Edge>),
    EdgeConnections(Vec<EdgeConnection>),
}

// ── Connector ────────────────────────────────────────────────────

/// Runs explorer operations against one engine through an injected transport.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct Connector {
    engine: Engine,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Connector {
    pub fn new(engine: Engine, transport: Arc<dyn Transport>) -> Self {
        tracing::info!(engine = %engine, "Connector ready");
        Self { engine, transport }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn codec(&self) -> IdCodec {
        IdCodec::for_engine(self.engine)
    }

    fn driver(&self) -> &'static EngineDriver {
        match self.engine {
            Engine::Gremlin => &gremlin::DRIVER,
            Engine::OpenCypher => &opencypher::DRIVER,
            Engine::Sparql => &sparql::DRIVER,
        }
    }

    fn normalizer(&self, operation: Operation) -> Normalizer {
        Normalizer::new(self.engine, operation)
    }

    fn shape_error(&self, operation: Operation) -> impl Fn(crate::error::ParseError) -> ConnectorError {
        let engine = self.engine;
        move |e| e.in_context(engine, operation)
    }

    /// Send one query. Transport failures are tagged with engine and operation.
    pub(crate) async fn execute(&self, operation: Operation, query: &str) -> Result<Value> {
        tracing::debug!(engine = %self.engine, operation = %operation, query, "Issuing query");
        self.transport
            .fetch(query)
            .await
            .map_err(|source| ConnectorError::Transport {
                engine: self.engine,
                operation,
                source,
            })
    }

    /// Send one query and parse its response.
    pub(crate) async fn fetch_parsed<T>(
        &self,
        operation: Operation,
        query: &str,
        parse: impl FnOnce(&Value) -> ParseResult<T>,
    ) -> Result<T> {
        let response = self.execute(operation, query).await?;
        parse(&response).map_err(self.shape_error(operation))
    }

    async fn run<R, T>(&self, operation: Operation, op: &Op<R, T>, request: &R) -> Result<T>
    where
        R: Sync,
    {
        let query = (op.build)(request)?;
        self.fetch_parsed(operation, &query, |response| (op.parse)(request, response))
            .await
    }

    // ── Operations ───────────────────────────────────────────────

    /// Discover vertex and edge types, their counts and attributes, and
    /// which types each edge type connects. Issues several queries.
    pub async fn fetch_schema(&self) -> Result<Schema> {
        let schema = (self.driver().fetch_schema)(self).await?;
        tracing::info!(
            engine = %self.engine,
            vertex_types = schema.vertices.len(),
            edge_types = schema.edges.len(),
            edge_connections = schema.edge_connections.len(),
            "Fetched schema"
        );
        Ok(schema)
    }

    pub async fn keyword_search(&self, request: &KeywordSearchRequest) -> Result<KeywordSearchResponse> {
        let raws = self
            .run(Operation::KeywordSearch, &self.driver().keyword_search, request)
            .await?;
        Ok(self.keyword_search_response(raws))
    }

    pub async fn fetch_neighbors_count(&self, request: &NeighborsCountRequest) -> Result<NeighborsCount> {
        self.run(Operation::FetchNeighborsCount, &self.driver().neighbors_count, request)
            .await
    }

    pub async fn fetch_neighbors(&self, request: &NeighborsRequest) -> Result<NeighborsResponse> {
        let raws = self
            .run(Operation::FetchNeighbors, &self.driver().neighbors, request)
            .await?;
        Ok(self.neighbors_response(raws))
    }

    pub async fn fetch_neighbor_predicates(
        &self,
        request: &NeighborPredicatesRequest,
    ) -> Result<Vec<NeighborPredicate>> {
        let raws = self
            .run(
                Operation::FetchNeighborPredicates,
                &self.driver().neighbor_predicates,
                request,
            )
            .await?;
        Ok(self.neighbor_predicates_response(raws))
    }

    /// Fetch one vertex with all of its attributes. `None` if it does not exist.
    pub async fn vertex_details(&self, request: &VertexDetailsRequest) -> Result<Option<Vertex>> {
        let raw = self
            .run(Operation::VertexDetails, &self.driver().vertex_details, request)
            .await?;
        Ok(raw.map(|raw| self.normalizer(Operation::VertexDetails).vertex(raw)))
    }

    /// Fetch one edge with all of its attributes. `None` if it does not exist.
    pub async fn edge_details(&self, request: &EdgeDetailsRequest) -> Result<Option<Edge>> {
        let raw = self
            .run(Operation::EdgeDetails, &self.driver().edge_details, request)
            .await?;
        Ok(raw.map(|raw| self.normalizer(Operation::EdgeDetails).edge(raw)))
    }

    pub async fn fetch_edge_connections(&self) -> Result<Vec<EdgeConnection>> {
        self.run(Operation::FetchEdgeConnections, &self.driver().edge_connections, &())
            .await
    }

    // ── Offline ──────────────────────────────────────────────────

    /// The query text an operation would send, without sending it.
    ///
    /// Schema discovery renders only its opening queries; the rest depend
    /// on what those return.
    pub fn render(&self, request: &QueryRequest) -> std::result::Result<String, QueryBuildError> {
        let driver = self.driver();
        match request {
            QueryRequest::Schema => Ok((driver.schema_queries)().join("\n\n")),
            QueryRequest::KeywordSearch(r) => (driver.keyword_search.build)(r),
            QueryRequest::NeighborsCount(r) => (driver.neighbors_count.build)(r),
            QueryRequest::Neighbors(r) => (driver.neighbors.build)(r),
            QueryRequest::NeighborPredicates(r) => (driver.neighbor_predicates.build)(r),
            QueryRequest::VertexDetails(r) => (driver.vertex_details.build)(r),
            QueryRequest::EdgeDetails(r) => (driver.edge_details.build)(r),
            QueryRequest::EdgeConnections => (driver.edge_connections.build)(&()),
        }
    }

    /// Parse and normalize a response captured for `request`.
    pub fn decode(&self, request: &QueryRequest, response: &Value) -> Result<QueryResponse> {
        let driver = self.driver();
        let operation = request.operation();
        let err = self.shape_error(operation);
        Ok(match request {
            QueryRequest::Schema => return Err(QueryBuildError::MultiQuery(operation).into()),
            QueryRequest::KeywordSearch(r) => QueryResponse::KeywordSearch(
                self.keyword_search_response((driver.keyword_search.parse)(r, response).map_err(err)?),
            ),
            QueryRequest::NeighborsCount(r) => QueryResponse::NeighborsCount(
                (driver.neighbors_count.parse)(r, response).map_err(err)?,
            ),
            QueryRequest::Neighbors(r) => QueryResponse::Neighbors(
                self.neighbors_response((driver.neighbors.parse)(r, response).map_err(err)?),
            ),
            QueryRequest::NeighborPredicates(r) => QueryResponse::NeighborPredicates(
                self.neighbor_predicates_response(
                    (driver.neighbor_predicates.parse)(r, response).map_err(err)?,
                ),
            ),
            QueryRequest::VertexDetails(r) => QueryResponse::VertexDetails(
                (driver.vertex_details.parse)(r, response)
                    .map_err(err)?
                    .map(|raw| self.normalizer(operation).vertex(raw)),
            ),
            QueryRequest::EdgeDetails(r) => QueryResponse::EdgeDetails(
                (driver.edge_details.parse)(r, response)
                    .map_err(err)?
                    .map(|raw| self.normalizer(operation).edge(raw)),
            ),
            QueryRequest::EdgeConnections => QueryResponse::EdgeConnections(
                (driver.edge_connections.parse)(&(), response).map_err(err)?,
            ),
        })
    }

    // ── Normalization ────────────────────────────────────────────

    fn keyword_search_response(&self, raws: Vec<RawVertex>) -> KeywordSearchResponse {
        KeywordSearchResponse {
            vertices: self.normalizer(Operation::KeywordSearch).vertices(raws),
        }
    }

    fn neighbors_response(&self, (vertices, edges): (Vec<RawVertex>, Vec<RawEdge>)) -> NeighborsResponse {
        let normalizer = self.normalizer(Operation::FetchNeighbors);
        NeighborsResponse {
            vertices: normalizer.vertices(vertices),
            edges: normalizer.edges(edges),
        }
    }

    fn neighbor_predicates_response(&self, raws: Vec<RawNeighborPredicate>) -> Vec<NeighborPredicate> {
        let normalizer = self.normalizer(Operation::FetchNeighborPredicates);
        raws.into_iter()
            .map(|raw| normalizer.neighbor_predicate(raw))
            .collect()
    }
}
