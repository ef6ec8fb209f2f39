//! Output bookkeeping: folder and file naming, public URLs, atomic writes and
//! scheduled cleanup.
//!
//! Every artifact lives in its own folder under the configured output root:
//!
//! ```text
//! {output_dir}/export_{uuid-v4 simple}_{YYYYmmdd_HHMMSS}/{filename}
//! {base_url}/export_{uuid-v4 simple}_{YYYYmmdd_HHMMSS}/{filename}
//! ```
//!
//! The folder name carries a full-entropy UUID, so two requests never share
//! a folder and the cleanup task needs no lock.

use crate::error::ExportError;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// `YYYYmmdd_HHMMSS` in local time.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// A fresh, practically unique folder name.
pub fn folder_name() -> String {
    format!("export_{}_{}", uuid::Uuid::new_v4().simple(), timestamp())
}

/// `export_{timestamp}.{ext}`.
pub fn default_filename(ext: &str) -> String {
    format!("export_{}.{}", timestamp(), ext.trim_start_matches('.'))
}

/// Reject names that are empty, absolute or climb out of the export folder.
pub fn validate_filename(name: &str) -> Result<(), ExportError> {
    let invalid = |reason: &str| ExportError::InvalidFilename {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(invalid("absolute paths are not allowed"));
    }
    let normalized = name.replace('\\', "/");
    for component in Path::new(&normalized).components() {
        match component {
            Component::ParentDir => return Err(invalid("'..' is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("absolute paths are not allowed"))
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    if normalized.ends_with('/') {
        return Err(invalid("name has no file part"));
    }
    Ok(())
}

/// Split `report.tar.gz` into `("report", ".tar.gz")`.
fn split_extension(name: &str) -> (&str, &str) {
    if let Some(stem) = name.strip_suffix(".tar.gz") {
        if !stem.is_empty() {
            return (stem, ".tar.gz");
        }
    }
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(pos) => name.split_at(pos),
    }
}

/// First path under `dir` for `filename` that does not exist yet:
/// `name.ext`, then `name_1.ext`, `name_2.ext`, …
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = filename.replace('\\', "/");
    let candidate = dir.join(&filename);
    if !candidate.exists() {
        return candidate;
    }

    let (parent, file) = match filename.rsplit_once('/') {
        Some((parent, file)) => (dir.join(parent), file.to_string()),
        None => (dir.to_path_buf(), filename.clone()),
    };
    let (stem, ext) = split_extension(&file);
    (1..)
        .map(|n| parent.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// `{base_url}/{folder}/{relative}` with `/` separators.
pub fn public_url(base_url: &str, folder: &str, relative: &Path) -> String {
    let relative = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{folder}/{relative}", base_url.trim_end_matches('/'))
}

/// Write through a sibling temp file and rename, creating parents on demand.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let io_err = |source| ExportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(io_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(e));
    }
    Ok(())
}

// ── Export folders ───────────────────────────────────────────────────────────

/// One request's output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFolder {
    pub name: String,
    pub path: PathBuf,
}

impl ExportFolder {
    /// Create a new uniquely named folder under `root`.
    pub async fn create(root: &Path) -> Result<Self, ExportError> {
        let name = folder_name();
        let path = root.join(&name);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| ExportError::OutputWriteFailed {
                path: path.clone(),
                source,
            })?;
        debug!("Created export folder {}", path.display());
        Ok(Self { name, path })
    }

    /// Free path for `filename` inside this folder.
    pub fn file_path(&self, filename: &str) -> PathBuf {
        unique_path(&self.path, filename)
    }

    /// Public URL of a file inside this folder.
    pub fn url_for(&self, base_url: &str, path: &Path) -> String {
        let relative = path.strip_prefix(&self.path).unwrap_or(path);
        public_url(base_url, &self.name, relative)
    }

    /// Delete the folder now. Used when a batch fails half way.
    pub async fn remove(&self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!("Removed export folder {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {e}", self.path.display()),
        }
    }
}

// ── Cleanup ──────────────────────────────────────────────────────────────────

/// Deletes non-persistent export folders after a fixed delay.
///
/// Each folder gets its own detached `tokio` task. Requests never wait on
/// them; the handles are only kept so a short-lived process can
/// [`wait_all`](Self::wait_all) or [`abort_all`](Self::abort_all) before it
/// exits.
pub struct CleanupScheduler {
    delay: Duration,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CleanupScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `folder` for deletion. Must be called inside a tokio runtime.
    pub fn schedule(&self, folder: PathBuf) {
        let delay = self.delay;
        debug!(
            "Scheduling deletion of {} in {}s",
            folder.display(),
            delay.as_secs()
        );
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::fs::remove_dir_all(&folder).await {
                Ok(()) => info!("Deleted expired export folder {}", folder.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Export folder {} already gone", folder.display())
                }
                Err(e) => warn!("Failed to delete {}: {e}", folder.display()),
            }
        });

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of deletions that have not run yet.
    pub fn pending(&self) -> usize {
        let handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait until every scheduled deletion has run.
    pub async fn wait_all(&self) {
        let handles: Vec<_> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Cleanup task failed: {e}");
                }
            }
        }
    }

    /// Cancel every scheduled deletion; the folders are kept.
    pub fn abort_all(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for CleanupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupScheduler")
            .field("delay", &self.delay)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use regex::Regex;
    use tempfile::TempDir;

    static FOLDER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^export_[0-9a-f]{32}_\d{8}_\d{6}$").unwrap());

    #[test]
    fn folder_names_are_unique_and_well_formed() {
        let a = folder_name();
        let b = folder_name();
        assert!(FOLDER.is_match(&a), "got: {a}");
        assert_ne!(a, b);
        assert!(default_filename("pdf").starts_with("export_"));
        assert!(default_filename(".pdf").ends_with(".pdf"));
        assert!(!default_filename(".pdf").ends_with("..pdf"));
    }

    #[test]
    fn filename_validation() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("docs/report.pdf").is_ok());
        assert!(validate_filename("a..b.txt").is_ok());
        for bad in ["", "  ", "/etc/passwd", "../x.pdf", "docs/../../x", "\\server\\x", "dir/"] {
            assert!(
                matches!(validate_filename(bad), Err(ExportError::InvalidFilename { .. })),
                "accepted: {bad:?}"
            );
        }
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let dir = TempDir::new().unwrap();
        let first = unique_path(dir.path(), "report.pdf");
        assert_eq!(first, dir.path().join("report.pdf"));
        std::fs::write(&first, b"1").unwrap();

        let second = unique_path(dir.path(), "report.pdf");
        assert_eq!(second, dir.path().join("report_1.pdf"));
        std::fs::write(&second, b"2").unwrap();
        assert_eq!(unique_path(dir.path(), "report.pdf"), dir.path().join("report_2.pdf"));

        std::fs::write(dir.path().join("bundle.tar.gz"), b"").unwrap();
        assert_eq!(
            unique_path(dir.path(), "bundle.tar.gz"),
            dir.path().join("bundle_1.tar.gz")
        );
    }

    #[test]
    fn urls_join_with_slashes() {
        assert_eq!(
            public_url("http://host/files/", "export_x", Path::new("docs/a.pdf")),
            "http://host/files/export_x/docs/a.pdf"
        );
    }

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.txt");
        write_atomic(&path, b"hello").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(!dir.path().join("nested/deeper/out.txt.tmp").exists());
    }

    #[tokio::test]
    async fn scheduled_folders_are_deleted() {
        let root = TempDir::new().unwrap();
        let folder = ExportFolder::create(root.path()).await.unwrap();
        assert!(folder.path.is_dir());

        let scheduler = CleanupScheduler::new(Duration::from_millis(10));
        scheduler.schedule(folder.path.clone());
        scheduler.wait_all().await;
        assert!(!folder.path.exists());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn aborted_cleanup_keeps_the_folder() {
        let root = TempDir::new().unwrap();
        let folder = ExportFolder::create(root.path()).await.unwrap();

        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));
        scheduler.schedule(folder.path.clone());
        assert_eq!(scheduler.pending(), 1);
        scheduler.abort_all();
        scheduler.wait_all().await;
        assert!(folder.path.exists());
    }
}
