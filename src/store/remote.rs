//! Remote entity store adapter for the managed platform API.
//!
//! Every call goes through the request gate: reads coalesce on their
//! request signature, mutations only take a concurrency permit. The
//! platform's record-not-found responses are normalized to the trait
//! contract (idempotent delete, typed NotFound on update).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use url::Url;

use crate::config::StoreConfig;

use super::{EntityKind, EntityStore, Filter, Record, RequestGate, StoreError};

pub struct RemoteStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    gate: Arc<RequestGate>,
}

impl RemoteStore {
    pub fn from_config(cfg: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = Url::parse(&cfg.base_url)
            .map_err(|e| StoreError::Transport(format!("invalid store base url: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: cfg.api_key.clone(),
            gate: Arc::new(RequestGate::new(cfg.max_concurrent_requests)),
        })
    }

    /// The gate is exposed so callers owning the store can reset it.
    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::Transport(format!("invalid store path {}: {}", path, e)))
    }

    /// One platform round trip, returning the parsed JSON body. `not_found`
    /// decides how a 404 maps back into the trait contract.
    fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        not_found: StoreError,
    ) -> impl std::future::Future<Output = Result<Value, StoreError>> + Send + 'static {
        let client = self.client.clone();
        let api_key = self.api_key.clone();

        async move {
            let mut builder = client.request(method, url).header("x-api-key", api_key);
            if let Some(body) = body {
                builder = builder.json(&body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| StoreError::Transport(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(not_found);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(StoreError::Transport(format!(
                    "platform returned {}: {}",
                    status, body
                )));
            }
            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| StoreError::Transport(format!("invalid platform response: {}", e)))
        }
    }

    fn parse_items(kind: EntityKind, body: &Value) -> Result<Vec<Record>, StoreError> {
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::InvalidRecord {
                kind,
                message: "expected an items array".to_string(),
            })?;

        items
            .iter()
            .map(|item| {
                item.as_object().cloned().ok_or_else(|| StoreError::InvalidRecord {
                    kind,
                    message: "expected record objects".to_string(),
                })
            })
            .collect()
    }

    fn parse_record(kind: EntityKind, body: Value) -> Result<Record, StoreError> {
        match body {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::InvalidRecord {
                kind,
                message: "expected a record object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl EntityStore for RemoteStore {
    async fn list(&self, kind: EntityKind, sort: Option<&str>) -> Result<Vec<Record>, StoreError> {
        let path = match sort {
            Some(sort) => format!("api/collections/{}/records?sort={}", kind.collection(), sort),
            None => format!("api/collections/{}/records", kind.collection()),
        };
        let url = self.endpoint(&path)?;
        let key = RequestGate::signature("GET", &path, &Value::Null);
        let fut = self.request(Method::GET, url, None, StoreError::KindNotFound(kind));

        let body = self.gate.run_shared(key, fut).await?;
        Self::parse_items(kind, &body)
    }

    async fn filter(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let path = format!("api/collections/{}/query", kind.collection());
        let url = self.endpoint(&path)?;
        let body = json!({ "conditions": filter.conditions });
        let key = RequestGate::signature("POST", &path, &body);
        let fut = self.request(Method::POST, url, Some(body), StoreError::KindNotFound(kind));

        let response = self.gate.run_shared(key, fut).await?;
        Self::parse_items(kind, &response)
    }

    async fn create(&self, kind: EntityKind, fields: Record) -> Result<Record, StoreError> {
        let path = format!("api/collections/{}/records", kind.collection());
        let url = self.endpoint(&path)?;
        let fut = self.request(
            Method::POST,
            url,
            Some(Value::Object(fields)),
            StoreError::KindNotFound(kind),
        );

        let body = self.gate.run(fut).await?;
        Self::parse_record(kind, body)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Record,
    ) -> Result<Record, StoreError> {
        let path = format!("api/collections/{}/records/{}", kind.collection(), id);
        let url = self.endpoint(&path)?;
        let fut = self.request(
            Method::PATCH,
            url,
            Some(Value::Object(fields)),
            StoreError::NotFound {
                kind,
                id: id.to_string(),
            },
        );

        let body = self.gate.run(fut).await?;
        Self::parse_record(kind, body)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let path = format!("api/collections/{}/records/{}", kind.collection(), id);
        let url = self.endpoint(&path)?;
        let fut = self.request(
            Method::DELETE,
            url,
            None,
            StoreError::NotFound {
                kind,
                id: id.to_string(),
            },
        );

        match self.gate.run(fut).await {
            Ok(_) => Ok(()),
            // Deleting an already-deleted record is success by contract
            Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
