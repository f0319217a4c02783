//! Networked key-value backend.
//!
//! Speaks the Redis-over-HTTP command protocol: every command is a JSON
//! array of strings POSTed to a single endpoint, answered with
//! `{"result": ...}` or `{"error": "..."}`. Keys are prefixed with a
//! namespace so several deployments can share one database.

use serde::Deserialize;
use serde_json::Value;

use super::KvStore;
use crate::error::{StoreError, StoreResult};

/// Keys fetched per SCAN page.
const SCAN_PAGE_SIZE: &str = "500";

/// Redis REST client
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Escape glob metacharacters for a SCAN MATCH pattern.
fn glob_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RemoteStore {
    pub fn new(url: impl Into<String>, token: Option<String>, namespace: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            token,
            namespace: namespace.into(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Run one command and return its `result`.
    async fn command(&self, args: &[&str]) -> StoreResult<Value> {
        let mut request = self.client.post(&self.url).json(&args);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let parsed: CommandResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(StoreError::Backend(format!("HTTP {}: {}", status, body)));
            }
            Err(e) => return Err(StoreError::Json(e)),
        };

        if let Some(message) = parsed.error {
            return Err(StoreError::Backend(message));
        }
        if !status.is_success() {
            return Err(StoreError::Backend(format!("HTTP {}", status)));
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    async fn scan_keys(&self) -> StoreResult<Vec<String>> {
        let pattern = format!("{}:*", glob_escape(&self.namespace));
        let mut cursor = "0".to_string();
        let mut keys = Vec::new();

        loop {
            let page = self
                .command(&["SCAN", &cursor, "MATCH", &pattern, "COUNT", SCAN_PAGE_SIZE])
                .await?;
            let (next, batch) = match page.as_array().map(Vec::as_slice) {
                Some([next, Value::Array(batch)]) => (as_string(next), batch.clone()),
                _ => (None, Vec::new()),
            };
            let next = next.ok_or_else(|| {
                StoreError::Backend(format!("unexpected SCAN reply: {}", page))
            })?;

            keys.extend(batch.iter().filter_map(as_string));
            if next == "0" {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

impl KvStore for RemoteStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = self.namespaced(key);
        self.command(&["SET", &key, value]).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = self.namespaced(key);
        let value = self.command(&["GET", &key]).await?;
        Ok(as_string(&value))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let key = self.namespaced(key);
        let removed = self.command(&["DEL", &key]).await?;
        Ok(removed.as_u64().unwrap_or(0) > 0)
    }

    async fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        let keys = self.scan_keys().await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["MGET"];
        args.extend(keys.iter().map(String::as_str));
        let values = self.command(&args).await?;
        let values = values.as_array().cloned().unwrap_or_default();

        let prefix = format!("{}:", self.namespace);
        Ok(keys
            .iter()
            .zip(values.iter())
            // Keys deleted between SCAN and MGET come back as null.
            .filter_map(|(k, v)| {
                let value = as_string(v)?;
                let key = k.strip_prefix(&prefix)?;
                Some((key.to_string(), value))
            })
            .collect())
    }
}
