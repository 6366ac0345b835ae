mod api;
mod cli;
mod router;
mod startup;
mod state;

use std::path::Path;

use bytes::Bytes;
use clap::Parser;
use tracing::info;

use sheetflow_core::Config;
use sheetflow_ingest::Ingestor;

use crate::cli::{Cli, Command};

fn load_config() -> Config {
    sheetflow_core::config::load_dotenv();
    Config::from_env()
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.log_summary();

    let state = startup::build_app_state(&config).await?;
    let poller = startup::spawn_background(&state);
    let app = router::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://localhost:{}", config.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(poller) = poller {
        poller.stop().await;
    }
    info!("Server stopped");
    Ok(())
}

/// One-shot transform of a local file through the same ingest path as uploads.
async fn process(config: &Config, path: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv");

    let ingestor = Ingestor::from_config(config).await?;
    let report = ingestor.submit_upload(filename, Bytes::from(bytes)).await?;

    info!(
        "Processed {} rows ({} selected) from {}",
        report.row_count,
        report.selected_count,
        path.display()
    );
    info!("  processed: {}", report.artifacts.processed.display());
    info!("  selected:  {}", report.artifacts.selected.display());
    info!("  tps:       {:.2}", ingestor.tps());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = load_config();

    match cli.command {
        None => serve(config).await,
        Some(Command::Serve {
            source_url,
            poll_interval,
        }) => {
            cli::apply_serve_overrides(&mut config, source_url, poll_interval);
            serve(config).await
        }
        Some(Command::Process { path }) => process(&config, &path).await,
    }
}
