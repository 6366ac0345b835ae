//! Change-gated ingestion.
//!
//! The [`Ingestor`] owns everything that ingestion mutates: the per-source
//! fingerprint ledger, the transaction counter, and the artifact store. Both the
//! background poller and the HTTP handlers go through it.
//!
//! - [`Ingestor::run_cycle`]: fetch, fingerprint, and reprocess only on change.
//! - [`Ingestor::submit_upload`] / [`Ingestor::submit_url`]: manual path, always
//!   reprocesses and never touches the ledger's fingerprints.
//!
//! The persist -> transform -> publish -> count -> advance fingerprint sequence
//! runs with the ingest lock held, so concurrent triggers never interleave writes
//! to the derived tables. Counters and fingerprints are readable without that
//! lock, so `stats` never waits on an ingestion in progress.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use sheetflow_core::config::TransformConfig;
use sheetflow_core::{Config, SheetflowError};

use crate::fetch::{normalize_source_url, HttpFetcher, ResourceFetcher};
use crate::fingerprint::{has_changed, Fingerprint};
use crate::store::{ArtifactStore, Artifacts, REMOTE_RAW_FILE};
use crate::transform::transform;

/// Result of one completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub artifacts: Artifacts,
    pub raw_path: PathBuf,
    pub fingerprint: Fingerprint,
    pub row_count: usize,
    pub selected_count: usize,
    /// Counter value after this ingestion was counted.
    pub transactions: u64,
    pub tps: f64,
}

/// What a gated cycle did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Content changed and was reprocessed.
    Changed(IngestReport),
    /// Content matched the stored fingerprint; nothing was written.
    Unchanged(Fingerprint),
    /// Another gated cycle for the same source was still running.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceState {
    pub url: String,
    pub fingerprint: Fingerprint,
    pub last_changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    pub started_at: DateTime<Utc>,
    pub transactions: u64,
    pub uptime_secs: f64,
    pub tps: f64,
    pub sources: Vec<SourceState>,
}

#[derive(Clone, Copy)]
struct SourceRecord {
    fingerprint: Fingerprint,
    changed_at: DateTime<Utc>,
}

pub struct Ingestor {
    store: ArtifactStore,
    transform: TransformConfig,
    fetcher: Arc<dyn ResourceFetcher>,
    /// Held across persist, transform, publish and the bookkeeping that follows.
    ingest_lock: Mutex<()>,
    sources: StdMutex<HashMap<String, SourceRecord>>,
    transactions: AtomicU64,
    in_flight: StdMutex<HashSet<String>>,
    started_at: Instant,
    started_wall: DateTime<Utc>,
}

impl Ingestor {
    pub fn new(
        store: ArtifactStore,
        transform: TransformConfig,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            store,
            transform,
            fetcher,
            ingest_lock: Mutex::new(()),
            sources: StdMutex::new(HashMap::new()),
            transactions: AtomicU64::new(0),
            in_flight: StdMutex::new(HashSet::new()),
            started_at: Instant::now(),
            started_wall: Utc::now(),
        }
    }

    /// Build an ingestor with an HTTP fetcher and the configured directories.
    pub async fn from_config(config: &Config) -> Result<Self, SheetflowError> {
        let store = ArtifactStore::open(&config.storage.upload_dir, &config.storage.results_dir).await?;
        let fetcher = HttpFetcher::new(config.poller.fetch_timeout())?;
        Ok(Self::new(store, config.transform.clone(), Arc::new(fetcher)))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// One gated observation of `url`.
    ///
    /// Fetch failures return `Err(Fetch)` and transform failures `Err(Transform)`;
    /// in both cases the stored fingerprint and the published tables are untouched.
    pub async fn run_cycle(&self, url: &str) -> Result<CycleOutcome, SheetflowError> {
        let key = source_key(url)?;
        let Some(_busy) = InFlight::acquire(&self.in_flight, &key) else {
            debug!(url = %key, "cycle already running for source, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let bytes = self.fetcher.fetch(&key).await?;
        let fingerprint = Fingerprint::of(&bytes);

        let guard = self.ingest_lock.lock().await;
        let stored = self.sources().get(&key).map(|r| r.fingerprint);
        if !has_changed(&fingerprint, stored.as_ref()) {
            debug!(url = %key, fingerprint = %fingerprint, "source unchanged");
            return Ok(CycleOutcome::Unchanged(fingerprint));
        }

        let report = self
            .ingest_locked(&guard, REMOTE_RAW_FILE, bytes, fingerprint)
            .await?;
        self.sources().insert(
            key.clone(),
            SourceRecord {
                fingerprint,
                changed_at: Utc::now(),
            },
        );
        drop(guard);

        info!(
            url = %key,
            fingerprint = %fingerprint,
            rows = report.row_count,
            selected = report.selected_count,
            "source changed, reprocessed"
        );
        Ok(CycleOutcome::Changed(report))
    }

    /// Manual upload: always reprocesses, fingerprints untouched.
    pub async fn submit_upload(&self, filename: &str, bytes: Bytes) -> Result<IngestReport, SheetflowError> {
        let fingerprint = Fingerprint::of(&bytes);
        let guard = self.ingest_lock.lock().await;
        let report = self.ingest_locked(&guard, filename, bytes, fingerprint).await?;
        drop(guard);
        info!(
            filename = %filename,
            rows = report.row_count,
            selected = report.selected_count,
            "upload processed"
        );
        Ok(report)
    }

    /// Manual link submission: fetch once, then behave like an upload.
    pub async fn submit_url(&self, url: &str) -> Result<IngestReport, SheetflowError> {
        let key = source_key(url)?;
        let bytes = self.fetcher.fetch(&key).await.map_err(|e| {
            warn!(url = %key, error = %e, "manual fetch failed");
            SheetflowError::from(e)
        })?;
        let fingerprint = Fingerprint::of(&bytes);
        let guard = self.ingest_lock.lock().await;
        let report = self
            .ingest_locked(&guard, REMOTE_RAW_FILE, bytes, fingerprint)
            .await?;
        drop(guard);
        info!(
            url = %key,
            rows = report.row_count,
            selected = report.selected_count,
            "linked source processed"
        );
        Ok(report)
    }

    /// Completed ingestions per second since startup. Never waits on an ingestion.
    pub fn tps(&self) -> f64 {
        self.tps_for(self.transactions.load(Ordering::SeqCst))
    }

    fn tps_for(&self, transactions: u64) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            transactions as f64 / elapsed
        } else {
            0.0
        }
    }

    pub async fn stats(&self) -> IngestStats {
        let transactions = self.transactions.load(Ordering::SeqCst);
        let mut sources: Vec<SourceState> = self
            .sources()
            .iter()
            .map(|(url, record)| SourceState {
                url: url.clone(),
                fingerprint: record.fingerprint,
                last_changed_at: record.changed_at,
            })
            .collect();
        sources.sort_by(|a, b| a.url.cmp(&b.url));

        IngestStats {
            started_at: self.started_wall,
            transactions,
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            tps: self.tps_for(transactions),
            sources,
        }
    }

    /// Stored fingerprint for a source, if it was ever ingested by a gated cycle.
    pub async fn fingerprint_for(&self, url: &str) -> Option<Fingerprint> {
        let key = source_key(url).ok()?;
        self.sources().get(&key).map(|r| r.fingerprint)
    }

    fn sources(&self) -> std::sync::MutexGuard<'_, HashMap<String, SourceRecord>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist, transform, publish, count. The guard proves the ingest lock is held.
    async fn ingest_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        raw_name: &str,
        bytes: Bytes,
        fingerprint: Fingerprint,
    ) -> Result<IngestReport, SheetflowError> {
        let raw_path = self.store.persist_raw(raw_name, &bytes).await?;

        let config = self.transform.clone();
        let output = tokio::task::spawn_blocking(move || transform(&bytes, &config))
            .await
            .map_err(|e| SheetflowError::Transform(format!("transform task failed: {e}")))??;

        let artifacts = self.store.publish(&output.processed, &output.selected).await?;
        let transactions = self.transactions.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(IngestReport {
            artifacts,
            raw_path,
            fingerprint,
            row_count: output.row_count,
            selected_count: output.selected_count,
            transactions,
            tps: self.tps_for(transactions),
        })
    }
}

/// Normalized URL string used as the ledger key and as the fetch target.
fn source_key(url: &str) -> Result<String, SheetflowError> {
    Ok(normalize_source_url(url)?.to_string())
}

/// Marks a source as processing; removed again on drop.
struct InFlight<'a> {
    set: &'a StdMutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a StdMutex<HashSet<String>>, key: &str) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        inserted.then(|| Self {
            set,
            key: key.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
