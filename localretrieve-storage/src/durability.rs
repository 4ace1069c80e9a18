//! Durability manager: maps `opfs:/dir/name.db` logical paths to files in
//! the origin-scoped store, loads the image at open, and writes periodic
//! point-in-time snapshots.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use localretrieve_core::config::DurabilityConfig;
use localretrieve_core::errors::{PersistenceError, RetrieveResult};
use localretrieve_core::models::DurabilityState;

use crate::adapter::SqliteAdapter;

/// Sentinel for an explicitly volatile database.
pub const MEMORY_PATH: &str = ":memory:";

/// Persists database images for one logical database.
#[derive(Debug)]
pub struct DurabilityManager {
    logical_path: String,
    /// Resolved snapshot file. `None` means volatile (in-memory only).
    file_path: Option<PathBuf>,
    quota_bytes: Option<u64>,
    last_sync_time: Option<DateTime<Utc>>,
}

impl DurabilityManager {
    /// Resolve a logical path against the configured base directory.
    ///
    /// Only `opfs:` paths are persistent. If the store directory cannot be
    /// created the manager degrades to volatile operation with a warning
    /// rather than blocking the worker.
    pub fn open(logical_path: &str, config: &DurabilityConfig) -> Self {
        let file_path = match resolve_opfs_path(logical_path, Path::new(&config.base_dir)) {
            Some(path) => match std::fs::create_dir_all(path.parent().unwrap_or(Path::new("."))) {
                Ok(()) => Some(path),
                Err(e) => {
                    warn!(
                        path = %logical_path,
                        error = %e,
                        "durability store unavailable, continuing in memory"
                    );
                    None
                }
            },
            None => None,
        };
        Self {
            logical_path: logical_path.to_string(),
            file_path,
            quota_bytes: config.quota_bytes,
            last_sync_time: None,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.file_path.is_some()
    }

    /// Path for a sidecar file next to the snapshot (e.g. the persistent
    /// embedding cache). `None` when volatile.
    pub fn sidecar_path(&self, extension: &str) -> Option<PathBuf> {
        self.file_path
            .as_ref()
            .map(|p| p.with_extension(extension))
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.last_sync_time
    }

    /// Load a previously persisted image into the adapter, if one exists.
    /// Returns `true` when an image was restored.
    pub fn load_into(&self, adapter: &mut SqliteAdapter) -> RetrieveResult<bool> {
        let Some(path) = &self.file_path else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        adapter.load_image_from(path)?;
        debug!(path = %path.display(), "database image restored");
        Ok(true)
    }

    /// Write a point-in-time snapshot: back the live image into a sibling
    /// temp file, then rename over the target so readers never observe a
    /// half-written image.
    pub fn snapshot(&mut self, adapter: &SqliteAdapter) -> RetrieveResult<()> {
        let Some(path) = self.file_path.clone() else {
            return Ok(());
        };

        let image_size = adapter.image_size()?;
        self.check_quota(image_size)?;

        let tmp = path.with_extension("db.tmp");
        adapter.save_image_to(&tmp)?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            PersistenceError::SaveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        self.last_sync_time = Some(Utc::now());
        debug!(path = %path.display(), bytes = image_size, "snapshot written");
        Ok(())
    }

    /// Remove the persisted image.
    pub fn clear(&mut self) -> RetrieveResult<()> {
        if let Some(path) = &self.file_path {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| PersistenceError::ClearFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
        }
        self.last_sync_time = None;
        Ok(())
    }

    /// Best-effort storage statistics: `(available, used, total)`, -1 where
    /// unknown.
    pub fn quota(&self) -> (i64, i64, i64) {
        let used = self
            .file_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len() as i64);
        match self.quota_bytes {
            Some(total) => {
                let total = total as i64;
                ((total - used).max(0), used, total)
            }
            None => (-1, used, -1),
        }
    }

    /// A snapshot needs room for the new image plus the previous one until
    /// the rename completes.
    fn check_quota(&self, image_size: u64) -> RetrieveResult<()> {
        let Some(total) = self.quota_bytes else {
            return Ok(());
        };
        let used = self
            .file_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len());
        let available = total.saturating_sub(used);
        if available < image_size.saturating_mul(2) {
            return Err(PersistenceError::QuotaExceeded {
                needed: image_size * 2,
                available,
            }
            .into());
        }
        Ok(())
    }

    pub fn state(&self, image_bytes: Option<u64>) -> DurabilityState {
        DurabilityState {
            persistent: self.is_persistent(),
            logical_path: Some(self.logical_path.clone()),
            last_sync_time: self.last_sync_time,
            image_bytes,
        }
    }
}

/// Map `opfs:/<dir>/<name>.db` into the base directory. Anything else
/// (including `:memory:`) is volatile. Path traversal segments are refused.
fn resolve_opfs_path(logical_path: &str, base_dir: &Path) -> Option<PathBuf> {
    let rest = logical_path.strip_prefix("opfs:/")?;
    if rest.is_empty() {
        return None;
    }
    let mut path = base_dir.to_path_buf();
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_path_is_volatile() {
        let manager = DurabilityManager::open(MEMORY_PATH, &DurabilityConfig::default());
        assert!(!manager.is_persistent());
    }

    #[test]
    fn opfs_path_resolves_under_base_dir() {
        let path = resolve_opfs_path("opfs:/app/data.db", Path::new("/base")).unwrap();
        assert_eq!(path, PathBuf::from("/base/app/data.db"));
    }

    #[test]
    fn traversal_segments_are_refused() {
        assert!(resolve_opfs_path("opfs:/../etc/passwd", Path::new("/base")).is_none());
        assert!(resolve_opfs_path("opfs://double", Path::new("/base")).is_none());
    }

    #[test]
    fn quota_unknown_without_cap() {
        let manager = DurabilityManager::open(MEMORY_PATH, &DurabilityConfig::default());
        let (available, _used, total) = manager.quota();
        assert_eq!(available, -1);
        assert_eq!(total, -1);
    }
}
