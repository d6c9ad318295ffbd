//! The injected query transport.
//!
//! The connector never opens a socket itself: whoever sets up the connection
//! hands it a [`Transport`] that sends query text to the engine endpoint
//! (HTTP, request signing, headers) and returns the decoded JSON body.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one query and return the raw JSON response.
    ///
    /// A non-success status must be reported as an error, not as a body.
    async fn fetch(&self, query: &str) -> anyhow::Result<Value>;
}

/// Adapts an async closure into a [`Transport`].
pub struct FnTransport<F>(pub F);

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn fetch(&self, query: &str) -> anyhow::Result<Value> {
        (self.0)(query.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_transport_receives_query_text() {
        let transport = FnTransport(|query: String| async move {
            Ok(serde_json::json!({ "echo": query }))
        });
        let body = transport.fetch("g.V().limit(1)").await.unwrap();
        assert_eq!(body["echo"], "g.V().limit(1)");
    }
}
