use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use sheetflow_core::SheetflowError;

pub const PROCESSED_FILE: &str = "processed_data.csv";
pub const SELECTED_FILE: &str = "selected_data.csv";
/// Raw payload name used for every remote-source ingestion.
pub const REMOTE_RAW_FILE: &str = "remote_source.csv";
const FALLBACK_UPLOAD_NAME: &str = "upload.csv";

/// One of the two derived tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Processed,
    Selected,
}

impl ArtifactKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::Processed => PROCESSED_FILE,
            ArtifactKind::Selected => SELECTED_FILE,
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = SheetflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(ArtifactKind::Processed),
            "selected" => Ok(ArtifactKind::Selected),
            _ => Err(SheetflowError::InvalidArtifact("Invalid file type".into())),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Processed => write!(f, "processed"),
            ArtifactKind::Selected => write!(f, "selected"),
        }
    }
}

/// Locations of a published pair of derived tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifacts {
    pub processed: PathBuf,
    pub selected: PathBuf,
}

/// Filesystem layout for raw payloads and derived tables.
///
/// ```text
/// uploads/
///   remote_source.csv     ← last fetched remote payload
///   <upload name>.csv     ← last manual upload with that name
/// results/
///   processed_data.csv
///   selected_data.csv
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    results_dir: PathBuf,
}

impl ArtifactStore {
    /// Create the store, ensuring both directories exist.
    pub async fn open(
        upload_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
    ) -> Result<Self, SheetflowError> {
        let upload_dir = upload_dir.into();
        let results_dir = results_dir.into();
        fs::create_dir_all(&upload_dir).await?;
        fs::create_dir_all(&results_dir).await?;
        Ok(Self {
            upload_dir,
            results_dir,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        self.results_dir.join(kind.file_name())
    }

    /// Write a raw payload under the uploads directory; `name` is sanitized first.
    pub async fn persist_raw(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, SheetflowError> {
        let path = self.upload_dir.join(sanitize_filename(name));
        write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// Replace both derived tables as a pair.
    ///
    /// Both payloads are staged and synced before either rename. If the second
    /// rename fails the first table is rolled back, so readers only ever see the
    /// previous pair or the new pair.
    pub async fn publish(&self, processed: &[u8], selected: &[u8]) -> Result<Artifacts, SheetflowError> {
        let artifacts = Artifacts {
            processed: self.artifact_path(ArtifactKind::Processed),
            selected: self.artifact_path(ArtifactKind::Selected),
        };

        let processed_tmp = stage(&artifacts.processed, processed).await?;
        let selected_tmp = match stage(&artifacts.selected, selected).await {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&processed_tmp).await;
                return Err(e);
            }
        };

        let backup = match keep_backup(&artifacts.processed).await {
            Ok(backup) => backup,
            Err(e) => {
                let _ = fs::remove_file(&processed_tmp).await;
                let _ = fs::remove_file(&selected_tmp).await;
                return Err(e.into());
            }
        };

        if let Err(e) = fs::rename(&processed_tmp, &artifacts.processed).await {
            let _ = fs::remove_file(&processed_tmp).await;
            let _ = fs::remove_file(&selected_tmp).await;
            if let Some(backup) = &backup {
                let _ = fs::remove_file(backup).await;
            }
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&selected_tmp, &artifacts.selected).await {
            let _ = fs::remove_file(&selected_tmp).await;
            let restored = match &backup {
                Some(backup) => fs::rename(backup, &artifacts.processed).await,
                None => fs::remove_file(&artifacts.processed).await,
            };
            if let Err(re) = restored {
                warn!(
                    path = %artifacts.processed.display(),
                    error = %re,
                    "failed to roll back processed table"
                );
            }
            return Err(e.into());
        }

        if let Some(backup) = backup {
            let _ = fs::remove_file(backup).await;
        }
        Ok(artifacts)
    }
}

/// Stage `data` next to `path`, then rename it over `path`.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SheetflowError> {
    let temp_path = stage(path, data).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// `<name><suffix>.<uuid>` in the same directory as `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = format!("{suffix}.{}", Uuid::new_v4());
    path.with_file_name(
        path.file_name()
            .map(|n| format!("{}{}", n.to_string_lossy(), name))
            .unwrap_or(name),
    )
}

/// Write and fsync `data` into a fresh temp file next to `path`.
async fn stage(path: &Path, data: &[u8]) -> Result<PathBuf, SheetflowError> {
    let temp_path = sibling(path, ".tmp");
    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(temp_path)
}

/// Hard-link the current file under a backup name. `None` when there is nothing to keep.
async fn keep_backup(path: &Path) -> std::io::Result<Option<PathBuf>> {
    let backup = sibling(path, ".bak");
    match fs::hard_link(path, &backup).await {
        Ok(()) => Ok(Some(backup)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(_) => {
            fs::copy(path, &backup).await?;
            Ok(Some(backup))
        }
    }
}

/// Reduce an uploaded filename to a safe base name.
///
/// Path components are dropped, characters outside `[A-Za-z0-9._-]` become `_`,
/// and leading dots are stripped. Empty results fall back to `upload.csv`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        FALLBACK_UPLOAD_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_kind_parsing() {
        assert_eq!("processed".parse::<ArtifactKind>().unwrap(), ArtifactKind::Processed);
        assert_eq!("selected".parse::<ArtifactKind>().unwrap(), ArtifactKind::Selected);
        assert!(matches!(
            "raw".parse::<ArtifactKind>(),
            Err(SheetflowError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("data.csv"), "data.csv");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\my file.csv"), "my_file.csv");
        assert_eq!(sanitize_filename(".hidden.csv"), "hidden.csv");
        assert_eq!(sanitize_filename(""), "upload.csv");
        assert_eq!(sanitize_filename("..."), "upload.csv");
    }

    #[tokio::test]
    async fn open_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path().join("up"), tmp.path().join("res"))
            .await
            .unwrap();
        assert!(store.upload_dir().is_dir());
        assert!(store.results_dir().is_dir());
    }

    #[tokio::test]
    async fn publish_overwrites_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path().join("up"), tmp.path().join("res"))
            .await
            .unwrap();

        store.publish(b"a\n1\n", b"a\n1\n").await.unwrap();
        let artifacts = store.publish(b"a\n2\n", b"a\n").await.unwrap();

        assert_eq!(std::fs::read(&artifacts.processed).unwrap(), b"a\n2\n");
        assert_eq!(std::fs::read(&artifacts.selected).unwrap(), b"a\n");

        let names: Vec<String> = std::fs::read_dir(store.results_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {names:?}");
        assert!(names.iter().all(|n| !n.contains(".tmp.")));
    }

    #[tokio::test]
    async fn persist_raw_uses_sanitized_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path().join("up"), tmp.path().join("res"))
            .await
            .unwrap();
        let path = store.persist_raw("../sneaky.csv", b"x\n").await.unwrap();
        assert_eq!(path, store.upload_dir().join("sneaky.csv"));
        assert_eq!(std::fs::read(path).unwrap(), b"x\n");
    }

    fn result_names(store: &ArtifactStore) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(store.results_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn failed_selected_swap_rolls_back_processed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path().join("up"), tmp.path().join("res"))
            .await
            .unwrap();
        let processed = store.artifact_path(ArtifactKind::Processed);
        let selected = store.artifact_path(ArtifactKind::Selected);
        std::fs::write(&processed, "name\nOLD\n").unwrap();
        // A non-empty directory cannot be replaced by a rename.
        std::fs::create_dir(&selected).unwrap();
        std::fs::write(selected.join("keep"), "x").unwrap();

        let err = store.publish(b"name\nNEW\n", b"name\nNEW\n").await.unwrap_err();
        assert!(matches!(err, SheetflowError::Io(_)));
        assert_eq!(std::fs::read_to_string(&processed).unwrap(), "name\nOLD\n");
        assert_eq!(result_names(&store), vec![PROCESSED_FILE, SELECTED_FILE]);
    }

    #[tokio::test]
    async fn failed_first_publish_leaves_no_processed_table() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path().join("up"), tmp.path().join("res"))
            .await
            .unwrap();
        let selected = store.artifact_path(ArtifactKind::Selected);
        std::fs::create_dir(&selected).unwrap();
        std::fs::write(selected.join("keep"), "x").unwrap();

        assert!(store.publish(b"a\n1\n", b"a\n1\n").await.is_err());
        assert!(!store.artifact_path(ArtifactKind::Processed).exists());
        assert_eq!(result_names(&store), vec![SELECTED_FILE]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_readers_never_see_partial_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path().join("up"), tmp.path().join("res"))
            .await
            .unwrap();
        let a = "a\n".to_string() + &"1111111111\n".repeat(50_000);
        let b = "a\n".to_string() + &"22222\n".repeat(120_000);
        store.publish(a.as_bytes(), a.as_bytes()).await.unwrap();

        let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let writer = {
            let store = store.clone();
            let (a, b, done) = (a.clone(), b.clone(), done.clone());
            tokio::spawn(async move {
                for i in 0..40 {
                    let body = if i % 2 == 0 { &b } else { &a };
                    store.publish(body.as_bytes(), body.as_bytes()).await.unwrap();
                }
                done.store(true, std::sync::atomic::Ordering::SeqCst);
            })
        };

        let path = store.artifact_path(ArtifactKind::Processed);
        loop {
            let finished = done.load(std::sync::atomic::Ordering::SeqCst);
            let seen = tokio::fs::read_to_string(&path).await.unwrap();
            assert!(seen == a || seen == b, "partial read of {} bytes", seen.len());
            if finished {
                break;
            }
        }
        writer.await.unwrap();
    }
}
