//! Remote source retrieval.
//!
//! [`ResourceFetcher`] is the seam the ingestion loop fetches through;
//! [`HttpFetcher`] is the production implementation backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use sheetflow_core::SheetflowError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

impl From<FetchError> for SheetflowError {
    fn from(e: FetchError) -> Self {
        SheetflowError::Fetch(e.to_string())
    }
}

/// Anything that can turn a URL into the raw bytes of a CSV payload.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetcher backed by a shared `reqwest` client with a bounded request timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sheetflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let target = normalize_source_url(url)?;
        debug!(url = %target, "fetching remote source");

        let response = self.client.get(target.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: target.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}

/// Parse a source URL and rewrite Google Sheets share links to their CSV export.
///
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=7` becomes
/// `https://docs.google.com/spreadsheets/d/<id>/export?format=csv&gid=7`.
/// Export and publish links, and every non-Sheets URL, are returned unchanged.
pub fn normalize_source_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(raw.to_string()));
    }
    if url.host_str() != Some("docs.google.com") {
        return Ok(url);
    }

    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    let sheet_id = match segments.as_slice() {
        ["spreadsheets", "d", id, rest @ ..]
            if *id != "e"
                && !matches!(rest.first(), Some(&"export") | Some(&"pub") | Some(&"gviz")) =>
        {
            *id
        }
        _ => return Ok(url),
    };

    let gid = url
        .query_pairs()
        .find(|(k, _)| k == "gid")
        .map(|(_, v)| v.into_owned())
        .or_else(|| {
            url.fragment().and_then(|frag| {
                frag.split('&')
                    .find_map(|part| part.strip_prefix("gid=").map(str::to_string))
            })
        });

    let mut export = format!(
        "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
        sheet_id
    );
    if let Some(gid) = gid {
        export.push_str("&gid=");
        export.push_str(&gid);
    }
    Url::parse(&export).map_err(|_| FetchError::InvalidUrl(raw.to_string()))
}
