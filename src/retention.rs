//! Zero-retention handling of uploaded files.
//!
//! Uploads are written into a per-request directory below the transient root. The directory is
//! owned by a [`TransientWorkspace`] guard and removed when the guard drops, on success, error
//! and unwind alike. Removal failures are logged and otherwise ignored: nothing is retried and
//! the caller's response is unaffected.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Scoped directory holding the uploads of a single request.
#[derive(Debug)]
pub struct TransientWorkspace {
    dir: PathBuf,
}

impl TransientWorkspace {
    /// Create a fresh workspace below `root`, creating `root` if needed.
    pub async fn open(root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = root.join(Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir(&dir).await?;
        Ok(Self { dir })
    }

    /// Directory owned by this workspace.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Persist an upload under a sanitized version of `filename`.
    pub async fn write_upload(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.join(safe_filename(filename));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

impl Drop for TransientWorkspace {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::info!("Transient upload data purged (zero-retention policy)");
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                tracing::error!(
                    dir = %self.dir.display(),
                    error = %error,
                    "Failed to purge transient upload data"
                );
            }
        }
    }
}

/// Delete everything below `root` and recreate it empty.
///
/// Run once at startup so files left behind by a crashed process do not survive a restart.
pub fn reset_root(root: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(root) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }
    std::fs::create_dir_all(root)
}

/// Reduce a client-supplied filename to a single safe path component.
pub fn safe_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
