//! Materialization against a slow, counting Gremlin transport.
//!
//! `g.V("<id>")` and `g.E("<id>")` answer with a full entity after a short
//! delay. Id `404` answers with an empty result and id `boom` with an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use explorer_connector::{Connector, Transport};
use explorer_core::{
    AttributeValue, Attributes, CacheConfig, Edge, EdgeMap, Engine, Vertex, VertexId, VertexMap,
};
use explorer_materialize::{EntityCache, FetchError, MaterializationCache, MaterializationError};

struct SlowTransport {
    delay: Duration,
    calls: AtomicUsize,
    per_id: Mutex<HashMap<String, usize>>,
}

impl SlowTransport {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
            per_id: Mutex::new(HashMap::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn calls_for(&self, id: &str) -> usize {
        self.per_id.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

fn list(items: Value) -> Value {
    json!({"result": {"data": {"@type": "g:List", "@value": items}}})
}

fn full_vertex(id: &str) -> Value {
    json!({
        "@type": "g:Vertex",
        "@value": {
            "id": id,
            "label": "airport",
            "properties": {
                "code": [{"@type": "g:VertexProperty", "@value": {"id": 0, "label": "code", "value": format!("C{id}")}}]
            }
        }
    })
}

fn full_edge(id: &str) -> Value {
    json!({
        "@type": "g:Edge",
        "@value": {
            "id": id, "label": "route", "outV": "1", "inV": "2",
            "properties": {"dist": {"@type": "g:Property", "@value": {"key": "dist", "value": {"@type": "g:Int64", "@value": 809}}}}
        }
    })
}

#[async_trait]
impl Transport for SlowTransport {
    async fn fetch(&self, query: &str) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let id = query
            .split_once("(\"")
            .and_then(|(_, rest)| rest.split_once("\")"))
            .map(|(id, _)| id.to_string())
            .ok_or_else(|| anyhow::anyhow!("unexpected query {query}"))?;
        *self.per_id.lock().unwrap().entry(id.clone()).or_default() += 1;

        match id.as_str() {
            "boom" => Err(anyhow::anyhow!("500 Internal Server Error")),
            "404" => Ok(list(json!([]))),
            _ if query.starts_with("g.E(") => Ok(list(json!([full_edge(&id)]))),
            _ => Ok(list(json!([full_vertex(&id)]))),
        }
    }
}

fn setup(delay: Duration) -> (Arc<SlowTransport>, MaterializationCache) {
    let transport = SlowTransport::new(delay);
    let connector = Connector::new(Engine::Gremlin, transport.clone());
    let cache = EntityCache::from_config(&CacheConfig::default());
    (transport, MaterializationCache::new(connector, cache))
}

fn vertex(id: &str, is_fragment: bool) -> Vertex {
    Vertex {
        id: VertexId::from_raw(id.into()),
        types: vec!["airport".to_string()],
        attributes: Attributes::new(),
        is_fragment,
    }
}

fn fragments(ids: &[&str]) -> VertexMap {
    ids.iter().map(|id| vertex(id, true)).collect()
}

fn ids(map: &VertexMap) -> Vec<String> {
    map.keys().map(ToString::to_string).collect()
}

#[tokio::test]
async fn fragments_are_upgraded_in_place() {
    let (transport, cache) = setup(Duration::from_millis(5));
    let mut input = fragments(&["1", "2"]);
    input.insert_entity(vertex("full", false));
    input.insert_entity(vertex("3", true));

    let output = cache.materialize_vertices(input).await;

    assert_eq!(ids(&output), ["1", "2", "full", "3"]);
    assert!(output.values().all(|v| !v.is_fragment));
    let one = output.get(&VertexId::from_raw("1".into())).unwrap();
    assert_eq!(
        one.attributes.get("code"),
        Some(&AttributeValue::String("C1".to_string()))
    );
    // Entities that were already complete cost nothing.
    assert_eq!(transport.calls(), 3);
    assert_eq!(transport.calls_for("full"), 0);
}

#[tokio::test]
async fn materializing_twice_fetches_once() {
    let (transport, cache) = setup(Duration::from_millis(5));
    let first = cache.materialize_vertices(fragments(&["1", "2"])).await;
    let second = cache.materialize_vertices(fragments(&["1", "2"])).await;
    assert_eq!(first, second);
    assert_eq!(transport.calls(), 2);

    // Already-materialized input needs no cache at all.
    let third = cache.materialize_vertices(first.clone()).await;
    assert_eq!(third, first);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn concurrent_batches_share_fetches() {
    let (transport, cache) = setup(Duration::from_millis(30));
    let (a, b) = tokio::join!(
        cache.materialize_vertices(fragments(&["1", "2"])),
        cache.materialize_vertices(fragments(&["2", "1"])),
    );
    assert_eq!(ids(&a), ["1", "2"]);
    assert_eq!(ids(&b), ["2", "1"]);
    assert_eq!(transport.calls_for("1"), 1);
    assert_eq!(transport.calls_for("2"), 1);
}

#[tokio::test]
async fn vanished_entities_are_dropped() {
    let (_, cache) = setup(Duration::from_millis(1));
    let report = cache
        .materialize_vertices_report(fragments(&["1", "404", "2"]))
        .await;
    assert_eq!(ids(&report.entities), ["1", "2"]);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn failures_are_reported_without_failing_the_batch() {
    let (transport, cache) = setup(Duration::from_millis(1));
    let report = cache
        .materialize_vertices_report(fragments(&["1", "boom"]))
        .await;

    assert_eq!(ids(&report.entities), ["1"]);
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        MaterializationError::Vertex { id, source } => {
            assert_eq!(id.to_string(), "boom");
            assert!(matches!(source.as_ref(), FetchError::Connector(_)));
        }
        other => panic!("unexpected failure {other:?}"),
    }

    // The failure was not cached; the next attempt goes back to the engine.
    cache.materialize_vertices(fragments(&["boom"])).await;
    assert_eq!(transport.calls_for("boom"), 2);
}

#[tokio::test]
async fn abandoned_fetches_still_populate_the_cache() {
    let (transport, cache) = setup(Duration::from_millis(50));
    let abandoned = tokio::time::timeout(
        Duration::from_millis(5),
        cache.materialize_vertices(fragments(&["1"])),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;

    let output = cache.materialize_vertices(fragments(&["1"])).await;
    assert!(!output.values().next().unwrap().is_fragment);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn abandoning_the_first_caller_does_not_duplicate_the_fetch() {
    let (transport, cache) = setup(Duration::from_millis(200));
    let (first, second) = tokio::join!(
        tokio::time::timeout(
            Duration::from_millis(20),
            cache.materialize_vertices(fragments(&["1"])),
        ),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cache.materialize_vertices(fragments(&["1"])).await
        },
    );

    assert!(first.is_err());
    assert_eq!(second.len(), 1);
    assert!(!second.values().next().unwrap().is_fragment);
    assert_eq!(transport.calls_for("1"), 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn refresh_bypasses_the_cache_and_dedupes() {
    let (transport, cache) = setup(Duration::from_millis(20));
    cache.materialize_vertices(fragments(&["1"])).await;
    assert_eq!(transport.calls(), 1);

    let id = VertexId::from_raw("1".into());
    let (a, b) = tokio::join!(cache.refresh_vertex(&id), cache.refresh_vertex(&id));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(transport.calls(), 2);

    let missing = cache
        .refresh_vertex(&VertexId::from_raw("404".into()))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn edges_materialize_like_vertices() {
    let (transport, cache) = setup(Duration::from_millis(1));
    let codec = cache.connector().codec();
    let fragment = |id: &str| Edge {
        id: codec.to_edge_id(id),
        edge_type: "route".to_string(),
        source_id: codec.to_vertex_id("1"),
        target_id: codec.to_vertex_id("2"),
        attributes: Attributes::new(),
        is_fragment: true,
    };
    let input: EdgeMap = [fragment("e1"), fragment("404")].into_iter().collect();

    let output = cache.materialize_edges(input).await;

    assert_eq!(output.len(), 1);
    let edge = output.values().next().unwrap();
    assert!(!edge.is_fragment);
    assert_eq!(edge.attributes.get("dist"), Some(&AttributeValue::Integer(809)));
    assert_eq!(transport.calls(), 2);

    let refreshed = cache.refresh_edge(&codec.to_edge_id("e1")).await.unwrap();
    assert_eq!(refreshed.as_ref(), Some(edge));
}
