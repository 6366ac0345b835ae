//! Test doubles shared by the ingestor and poller tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::fetch::{FetchError, ResourceFetcher};

/// Serves whatever body (or error status) was last configured.
pub(crate) struct FakeFetcher {
    response: Mutex<Result<Vec<u8>, u16>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl FakeFetcher {
    pub(crate) fn serving(body: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(body.as_bytes().to_vec())),
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    /// Every fetch blocks until `gate` is notified.
    pub(crate) fn gated(body: &str, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(body.as_bytes().to_vec())),
            calls: AtomicUsize::new(0),
            gate: Some(gate),
        })
    }

    pub(crate) fn set_body(&self, body: &str) {
        *self.response.lock().unwrap() = Ok(body.as_bytes().to_vec());
    }

    pub(crate) fn set_status(&self, status: u16) {
        *self.response.lock().unwrap() = Err(status);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let response = self.response.lock().unwrap().clone();
        match response {
            Ok(body) => Ok(Bytes::from(body)),
            Err(status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }
}
