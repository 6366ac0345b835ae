use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub poller: PollerConfig,
    pub transform: TransformConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SHEETFLOW_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SHEETFLOW_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            poller: PollerConfig::from_env_profiled(p),
            transform: TransformConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:    {}:{} (max upload {} MB)", self.server.host, self.server.port, self.server.max_upload_mb);
        tracing::info!(
            "  storage:   uploads={}, results={}",
            self.storage.upload_dir.display(),
            self.storage.results_dir.display()
        );
        tracing::info!(
            "  poller:    source={}, interval={}s, fetch_timeout={}s",
            self.poller.source_url.as_deref().unwrap_or("(disabled)"),
            self.poller.interval_secs,
            self.poller.fetch_timeout_secs
        );
        tracing::info!(
            "  transform: filter_column={}",
            self.transform.filter_column.as_deref().unwrap_or("(first column)")
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub max_upload_mb: u64,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 5000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            max_upload_mb: profiled_env_u64(p, "MAX_UPLOAD_MB", 100),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Raw payloads land here (one file per upload name, fixed name for the remote source).
    pub upload_dir: PathBuf,
    /// `processed_data.csv` and `selected_data.csv` live here.
    pub results_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            upload_dir: PathBuf::from(profiled_env_or(p, "UPLOAD_DIR", "uploads")),
            results_dir: PathBuf::from(profiled_env_or(p, "RESULTS_DIR", "results")),
        }
    }
}

// ── Poller ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Remote CSV to watch. `None` disables the background poller.
    pub source_url: Option<String>,
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl PollerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            source_url: profiled_env_opt(p, "SOURCE_URL"),
            interval_secs: profiled_env_u64(p, "POLL_INTERVAL_SECS", 60).max(1),
            fetch_timeout_secs: profiled_env_u64(p, "FETCH_TIMEOUT_SECS", 30).max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

// ── Transform ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Column whose non-null rows form the selected table. `None` = first column.
    pub filter_column: Option<String>,
}

impl TransformConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            filter_column: profiled_env_opt(p, "FILTER_COLUMN"),
        }
    }
}
