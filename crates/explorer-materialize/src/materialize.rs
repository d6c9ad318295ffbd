//! Fragment materialization.
//!
//! Search and expansion hand out fragments. Before an entity is shown in
//! full, its fragment is swapped for the result of a detail fetch. Each id
//! moves from fragment to materializing to materialized, and the detail
//! fetch behind that transition runs at most once at a time per id.

use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};

use explorer_connector::{
    Connector, EdgeDetailsRequest, Operation, Result as ConnectorResult,
    VertexDetailsRequest,
};
use explorer_core::{
    CacheConfig, Edge, EdgeId, EdgeMap, Entity, EntityMap, Vertex, VertexId, VertexMap,
};

use crate::error::{FetchError, FetchResult, MaterializationError};
use crate::query_cache::{QueryCache, QueryKey};

/// Detail-fetch results for vertices and edges.
///
/// `None` records a confirmed absence.
#[derive(Clone)]
pub struct EntityCache {
    pub vertices: QueryCache<Option<Vertex>>,
    pub edges: QueryCache<Option<Edge>>,
}

impl EntityCache {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            vertices: QueryCache::from_config(config),
            edges: QueryCache::from_config(config),
        }
    }
}

/// A materialized batch, with the ids that had to be dropped on error.
#[derive(Debug, Clone)]
pub struct Materialized<M> {
    pub entities: M,
    pub failures: Vec<MaterializationError>,
}

#[derive(Clone)]
pub struct MaterializationCache {
    connector: Connector,
    cache: EntityCache,
}

impl MaterializationCache {
    pub fn new(connector: Connector, cache: EntityCache) -> Self {
        Self { connector, cache }
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    fn vertex_key(&self, id: &VertexId) -> QueryKey {
        QueryKey::new(
            self.connector.engine(),
            Operation::VertexDetails,
            self.connector.codec().get_raw_id(id),
        )
    }

    fn edge_key(&self, id: &EdgeId) -> QueryKey {
        QueryKey::new(
            self.connector.engine(),
            Operation::EdgeDetails,
            self.connector.codec().get_raw_id(id),
        )
    }

    fn vertex_fetch(
        &self,
        vertex_id: VertexId,
    ) -> impl FnOnce() -> BoxFuture<'static, ConnectorResult<Option<Vertex>>> + Send + 'static {
        let connector = self.connector.clone();
        move || {
            Box::pin(async move {
                connector
                    .vertex_details(&VertexDetailsRequest { vertex_id })
                    .await
            })
        }
    }

    fn edge_fetch(
        &self,
        edge_id: EdgeId,
    ) -> impl FnOnce() -> BoxFuture<'static, ConnectorResult<Option<Edge>>> + Send + 'static {
        let connector = self.connector.clone();
        move || {
            Box::pin(async move {
                connector
                    .edge_details(&EdgeDetailsRequest { edge_id })
                    .await
            })
        }
    }

    async fn vertex(&self, id: VertexId) -> FetchResult<Option<Vertex>> {
        let key = self.vertex_key(&id);
        self.cache
            .vertices
            .ensure_query_data(key, self.vertex_fetch(id))
            .await
    }

    async fn edge(&self, id: EdgeId) -> FetchResult<Option<Edge>> {
        let key = self.edge_key(&id);
        self.cache.edges.ensure_query_data(key, self.edge_fetch(id)).await
    }

    // ── Batches ──────────────────────────────────────────────────

    /// Replace every fragment with its full vertex. Vertices that no
    /// longer exist or failed to load are dropped; order is preserved.
    pub async fn materialize_vertices(&self, vertices: VertexMap) -> VertexMap {
        self.materialize_vertices_report(vertices).await.entities
    }

    pub async fn materialize_vertices_report(
        &self,
        vertices: VertexMap,
    ) -> Materialized<VertexMap> {
        let (entities, failed) = materialize(vertices, |id| self.vertex(id)).await;
        Materialized {
            entities,
            failures: failed
                .into_iter()
                .map(|(id, source)| MaterializationError::Vertex { id, source })
                .collect(),
        }
    }

    /// Edge counterpart of [`Self::materialize_vertices`].
    pub async fn materialize_edges(&self, edges: EdgeMap) -> EdgeMap {
        self.materialize_edges_report(edges).await.entities
    }

    pub async fn materialize_edges_report(&self, edges: EdgeMap) -> Materialized<EdgeMap> {
        let (entities, failed) = materialize(edges, |id| self.edge(id)).await;
        Materialized {
            entities,
            failures: failed
                .into_iter()
                .map(|(id, source)| MaterializationError::Edge { id, source })
                .collect(),
        }
    }

    // ── Forced refresh ───────────────────────────────────────────

    /// Re-fetch a vertex even if it is cached, replacing the cached copy.
    pub async fn refresh_vertex(
        &self,
        id: &VertexId,
    ) -> Result<Option<Vertex>, MaterializationError> {
        let key = self.vertex_key(id);
        self.cache
            .vertices
            .fetch_query(key, self.vertex_fetch(id.clone()))
            .await
            .map_err(|source| MaterializationError::Vertex {
                id: id.clone(),
                source,
            })
    }

    pub async fn refresh_edge(
        &self,
        id: &EdgeId,
    ) -> Result<Option<Edge>, MaterializationError> {
        let key = self.edge_key(id);
        self.cache
            .edges
            .fetch_query(key, self.edge_fetch(id.clone()))
            .await
            .map_err(|source| MaterializationError::Edge {
                id: id.clone(),
                source,
            })
    }
}

/// Fan out one fetch per fragment, then fan the results back into `entities`.
async fn materialize<V, F, Fut>(
    mut entities: EntityMap<V::Id, V>,
    fetch: F,
) -> (EntityMap<V::Id, V>, Vec<(V::Id, Arc<FetchError>)>)
where
    V: Entity,
    V::Id: std::fmt::Display,
    F: Fn(V::Id) -> Fut,
    Fut: Future<Output = FetchResult<Option<V>>>,
{
    let pending = entities.fragment_ids();
    if pending.is_empty() {
        return (entities, Vec::new());
    }
    tracing::debug!(count = pending.len(), "Materializing fragments");

    let results = join_all(pending.into_iter().map(|id| {
        let fetched = fetch(id.clone());
        async move { (id, fetched.await) }
    }))
    .await;

    let mut failures = Vec::new();
    for (id, result) in results {
        match result {
            Ok(Some(entity)) => {
                entities.insert(id, entity);
            }
            Ok(None) => {
                tracing::debug!(id = %id, "Entity no longer exists; dropping");
                entities.remove(&id);
            }
            Err(source) => {
                tracing::warn!(id = %id, error = %source, "Materialization failed; dropping");
                entities.remove(&id);
                failures.push((id, source));
            }
        }
    }
    (entities, failures)
}
