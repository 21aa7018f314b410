//! Outbound calls to payment gateways.
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use log::*;
use serde_json::Value;

use crate::providers::ProviderError;

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// POSTs a JSON body to `path` on the gateway and returns the decoded JSON response.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = self.url(path);
        trace!("💳️ POST {url}");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("💳️ {url} returned {status}: {text}");
            return Err(ProviderError::Transport(format!("{url} returned {status}")));
        }
        let value = response.json::<Value>().await.map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(value)
    }
}

/// A transport that answers from a script instead of the network. Used in sandbox deployments and tests.
///
/// Responses queued for a path are returned in order; once a path's queue is empty its fallback (if any) is returned
/// on every call. Every request is recorded.
#[derive(Default)]
pub struct MemoryTransport {
    queued: Mutex<HashMap<String, VecDeque<Result<Value, ProviderError>>>>,
    fallback: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, path: &str, response: Result<Value, ProviderError>) -> &Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.entry(path.to_string()).or_default().push_back(response);
        }
        self
    }

    pub fn set_fallback(&self, path: &str, response: Value) -> &Self {
        if let Ok(mut fallback) = self.fallback.lock() {
            fallback.insert(path.to_string(), response);
        }
        self
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProviderTransport for MemoryTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((path.to_string(), body.clone()));
        }
        let queued = self.queued.lock().ok().and_then(|mut q| q.get_mut(path).and_then(|q| q.pop_front()));
        if let Some(response) = queued {
            return response;
        }
        self.fallback
            .lock()
            .ok()
            .and_then(|f| f.get(path).cloned())
            .ok_or_else(|| ProviderError::Transport(format!("no scripted response for {path}")))
    }
}
