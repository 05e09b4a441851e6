//! Outbound request gate for the managed platform.
//!
//! Two small client-side mechanisms, built as one injectable component so
//! tests can create isolated instances instead of sharing process-wide
//! state: a semaphore bounding simultaneous outbound calls, and an
//! in-flight map that coalesces identical concurrent reads into a single
//! platform request. Mutations never coalesce; they only take a permit.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use super::StoreError;

type SharedOutcome = Result<Arc<Value>, StoreError>;
type InFlight = Shared<BoxFuture<'static, SharedOutcome>>;

pub struct RequestGate {
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
}

impl RequestGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Signature of an outbound request, used as the coalescing key.
    pub fn signature(method: &str, path: &str, body: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update(body.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Drop all in-flight entries. Tests use this to get a clean slate.
    pub fn reset(&self) {
        self.in_flight.lock().unwrap().clear();
    }

    /// Run a mutation under the concurrency cap, without coalescing.
    pub async fn run<F>(&self, fut: F) -> Result<Value, StoreError>
    where
        F: Future<Output = Result<Value, StoreError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::Transport("request gate closed".to_string()))?;
        fut.await
    }

    /// Run a read under the concurrency cap. Concurrent calls with the same
    /// signature share one in-flight request and one result.
    pub async fn run_shared<F>(&self, key: String, fut: F) -> SharedOutcome
    where
        F: Future<Output = Result<Value, StoreError>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(existing) = in_flight.get(&key) {
                existing.clone()
            } else {
                let permits = Arc::clone(&self.permits);
                let registry = Arc::clone(&self.in_flight);
                let entry_key = key.clone();
                let shared = async move {
                    let outcome = match permits.acquire().await {
                        Ok(_permit) => fut.await.map(Arc::new),
                        Err(_) => Err(StoreError::Transport("request gate closed".to_string())),
                    };
                    registry.lock().unwrap().remove(&entry_key);
                    outcome
                }
                .boxed()
                .shared();
                in_flight.insert(key, shared.clone());
                shared
            }
        };

        shared.await
    }
}
