//! Change-gated CSV ingestion: fetch, fingerprint, transform, publish.

pub mod fetch;
pub mod fingerprint;
pub mod ingestor;
pub mod poller;
pub mod store;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{normalize_source_url, FetchError, HttpFetcher, ResourceFetcher};
pub use fingerprint::{has_changed, Fingerprint};
pub use ingestor::{CycleOutcome, IngestReport, IngestStats, Ingestor, SourceState};
pub use poller::Poller;
pub use store::{ArtifactKind, ArtifactStore, Artifacts};
pub use transform::{transform, uppercase_record, Table, TransformOutput};
