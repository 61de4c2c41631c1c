//! In-memory adapters
//!
//! An HTTP client answering from a table of canned responses plus optional
//! dynamic handlers (the shape the integration tests use to stand in for a
//! whole federation), and a store backend for trust marks.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::ports::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::ports::store::{KeyValueStore, ModifyFn, StoreError};

/// Dynamic route handler
pub type RouteHandler = Arc<
    dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send>>
        + Send
        + Sync,
>;

/// HTTP client answering from registered routes
#[derive(Default)]
pub struct InMemoryHttpClient {
    canned: RwLock<HashMap<String, HttpResponse>>,
    handlers: RwLock<Vec<(String, RouteHandler)>>,
}

impl InMemoryHttpClient {
    /// An empty client; unknown URLs yield [`HttpError::NoRoute`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned 200 response for an exact URL
    pub fn route(&self, url: &str, body: impl Into<String>, content_type: &str) {
        self.route_response(url, HttpResponse::ok(body, content_type));
    }

    /// Register a canned response for an exact URL
    pub fn route_response(&self, url: &str, response: HttpResponse) {
        self.canned
            .write()
            .expect("route table poisoned")
            .insert(url.to_string(), response);
    }

    /// Remove a canned route, simulating an unreachable endpoint
    pub fn remove_route(&self, url: &str) {
        self.canned.write().expect("route table poisoned").remove(url);
    }

    /// Register a dynamic handler for URLs starting with `prefix`
    pub fn handle_prefix(&self, prefix: &str, handler: RouteHandler) {
        self.handlers
            .write()
            .expect("handler table poisoned")
            .push((prefix.to_string(), handler));
    }

    fn canned_for(&self, url: &str) -> Option<HttpResponse> {
        self.canned
            .read()
            .expect("route table poisoned")
            .get(url)
            .cloned()
    }

    fn handler_for(&self, url: &str) -> Option<RouteHandler> {
        self.handlers
            .read()
            .expect("handler table poisoned")
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, h)| h.clone())
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        if request.form.is_none() {
            if let Some(response) = self.canned_for(&request.url) {
                return Ok(response);
            }
        }
        if let Some(handler) = self.handler_for(&request.url) {
            return handler(request).await;
        }
        Err(HttpError::NoRoute(request.url))
    }
}

#[async_trait]
impl HttpClient for InMemoryHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.dispatch(HttpRequest {
            url: url.to_string(),
            form: None,
        })
        .await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, HttpError> {
        self.dispatch(HttpRequest {
            url: url.to_string(),
            form: Some(form.clone()),
        })
        .await
    }
}

/// In-memory key-value store
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn modify(&self, key: &str, f: ModifyFn) -> Result<Option<Value>, StoreError> {
        let mut entries = self.entries.lock().await;
        let current = entries.get(key).cloned();
        match f(current)? {
            Some(value) => {
                entries.insert(key.to_string(), value.clone());
                Ok(Some(value))
            }
            None => {
                entries.remove(key);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn canned_routes_and_no_route() {
        let http = InMemoryHttpClient::new();
        http.route("https://ta.example.org/x", "body", "text/plain");

        let resp = http.get("https://ta.example.org/x").await.unwrap();
        assert_eq!(resp.body, "body");
        assert!(matches!(
            http.get("https://ta.example.org/missing").await,
            Err(HttpError::NoRoute(_))
        ));
    }

    #[tokio::test]
    async fn modify_is_read_modify_write() {
        let store = InMemoryStore::new();
        store.put("k", json!([1])).await.unwrap();

        let written = store
            .modify(
                "k",
                Box::new(|cur| {
                    let mut list = cur.and_then(|v| v.as_array().cloned()).unwrap_or_default();
                    list.push(json!(2));
                    Ok(Some(Value::Array(list)))
                }),
            )
            .await
            .unwrap();
        assert_eq!(written, Some(json!([1, 2])));

        // A closure returning None deletes the key
        store.modify("k", Box::new(|_| Ok(None))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
