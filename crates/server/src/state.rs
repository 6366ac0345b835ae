use std::sync::Arc;

use sheetflow_core::Config;
use sheetflow_ingest::Ingestor;

pub struct AppState {
    pub config: Config,
    pub ingestor: Arc<Ingestor>,
}
