//! Server startup: shared state initialization and background task spawning.

use std::sync::Arc;

use tracing::info;

use sheetflow_core::Config;
use sheetflow_ingest::{Ingestor, Poller};

use crate::state::AppState;

/// Build `AppState`: open the artifact directories and the HTTP-backed ingestor.
pub async fn build_app_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let ingestor = Ingestor::from_config(config).await?;
    info!(
        uploads = %ingestor.store().upload_dir().display(),
        results = %ingestor.store().results_dir().display(),
        "artifact store ready"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        ingestor: Arc::new(ingestor),
    }))
}

/// Start the source poller when a source URL is configured.
pub fn spawn_background(state: &AppState) -> Option<Poller> {
    let Some(url) = state.config.poller.source_url.clone() else {
        info!("no SOURCE_URL configured, poller disabled");
        return None;
    };
    Some(Poller::spawn(
        state.ingestor.clone(),
        url,
        state.config.poller.interval(),
    ))
}
