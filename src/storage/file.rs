//! Durable surface stored as a single JSON object on disk.
//!
//! The whole map is held in memory and rewritten on every mutation via a
//! temp-file-then-rename, so a crash leaves either the old or the new file,
//! never a torn one. Sized for cache metadata (megabytes), not bulk data.
//!
//! Because each surface rewrites the whole file from its own map, two
//! surfaces over one path would overwrite each other. Managers therefore go
//! through [`FileSurface::open_shared`], which hands out one surface per
//! canonical path for the life of the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{const_mutex, Mutex, RwLock};
use tracing::{debug, warn};

use super::surface::{check_quota, item_size, KeyValueSurface};
use super::traits::StorageError;

/// Surfaces currently open through [`FileSurface::open_shared`].
static OPEN_SURFACES: Mutex<BTreeMap<PathBuf, Weak<FileSurface>>> = const_mutex(BTreeMap::new());

pub struct FileSurface {
    path: PathBuf,
    items: RwLock<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl FileSurface {
    /// Open (or create) the store at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file also starts
    /// empty (with a warning) and is overwritten by the next write.
    pub fn open(path: impl Into<PathBuf>, quota_bytes: Option<usize>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let items = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(items) => {
                    debug!(path = %path.display(), items = items.len(), "Loaded file surface");
                    items
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt cache file, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(Self {
            path,
            items: RwLock::new(items),
            quota_bytes,
        })
    }

    /// Open `path`, or join the surface already open on the same file.
    ///
    /// Paths are compared after canonicalizing the parent directory, so
    /// `dir/sub/../cache.json` and `dir/cache.json` share one surface. The
    /// first opener's quota applies to every sharer.
    pub fn open_shared(path: impl Into<PathBuf>, quota_bytes: Option<usize>) -> Result<Arc<Self>, StorageError> {
        let path = canonical_path(path.into())?;

        let mut open = OPEN_SURFACES.lock();
        open.retain(|_, surface| surface.strong_count() > 0);
        if let Some(surface) = open.get(&path).and_then(Weak::upgrade) {
            if surface.quota_bytes != quota_bytes {
                warn!(
                    path = %path.display(),
                    quota = ?surface.quota_bytes,
                    requested = ?quota_bytes,
                    "File surface already open with another quota, keeping the first"
                );
            }
            return Ok(surface);
        }

        let surface = Arc::new(Self::open(path.clone(), quota_bytes)?);
        open.insert(path, Arc::downgrade(&surface));
        Ok(surface)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(items).map_err(|source| StorageError::Serialization {
            key: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn used(items: &BTreeMap<String, String>) -> usize {
        items.iter().map(|(k, v)| item_size(k, v)).sum()
    }
}

/// `path` with its parent directory created and canonicalized.
fn canonical_path(path: PathBuf) -> Result<PathBuf, StorageError> {
    let Some(name) = path.file_name().map(ToOwned::to_owned) else {
        return Ok(path);
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    Ok(parent.canonicalize()?.join(name))
}

impl KeyValueSurface for FileSurface {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut items = self.items.write();
        let old_size = items.get(key).map(|v| item_size(key, v)).unwrap_or(0);
        check_quota(Self::used(&items), old_size, item_size(key, &value), self.quota_bytes)?;

        let previous = items.insert(key.to_string(), value);
        if let Err(e) = self.persist(&items) {
            // Roll back so memory never runs ahead of disk.
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool, StorageError> {
        let mut items = self.items.write();
        let Some(previous) = items.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&items) {
            items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    fn remove_items(&self, keys: &[String]) -> Result<usize, StorageError> {
        let mut items = self.items.write();
        let removed: Vec<(String, String)> = keys
            .iter()
            .filter_map(|key| items.remove_entry(key.as_str()))
            .collect();
        if removed.is_empty() {
            return Ok(0);
        }
        if let Err(e) = self.persist(&items) {
            items.extend(removed);
            return Err(e);
        }
        Ok(removed.len())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.read().keys().cloned().collect())
    }

    fn used_bytes(&self) -> usize {
        Self::used(&self.items.read())
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let surface = FileSurface::open(dir.path().join("cache.json"), None).unwrap();
        assert!(surface.is_empty());
        assert!(!surface.path().exists());
    }

    #[test]
    fn test_writes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        {
            let surface = FileSurface::open(&path, None).unwrap();
            surface.set_item("a", "1".into()).unwrap();
            surface.set_item("b", "2".into()).unwrap();
            surface.remove_item("a").unwrap();
        }

        let reopened = FileSurface::open(&path, None).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["b".to_string()]);
        assert_eq!(reopened.get_item("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{not json").unwrap();

        let surface = FileSurface::open(&path, None).unwrap();
        assert!(surface.is_empty());

        surface.set_item("k", "v".into()).unwrap();
        let reopened = FileSurface::open(&path, None).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_quota_rejects_without_touching_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let surface = FileSurface::open(&path, Some(4)).unwrap();

        surface.set_item("k", "123".into()).unwrap();
        let err = surface.set_item("k2", "1".into()).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 7, quota: 4 }));

        let reopened = FileSurface::open(&path, None).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn test_open_shared_is_one_surface_per_file() {
        let dir = tempdir().unwrap();
        let first = FileSurface::open_shared(dir.path().join("cache.json"), None).unwrap();
        let second = FileSurface::open_shared(dir.path().join("sub").join("..").join("cache.json"), None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        first.set_item("a_k", "1".into()).unwrap();
        second.set_item("b_k", "2".into()).unwrap();

        let on_disk = FileSurface::open(dir.path().join("cache.json"), None).unwrap();
        assert_eq!(on_disk.keys().unwrap(), vec!["a_k".to_string(), "b_k".to_string()]);
    }

    #[test]
    fn test_open_shared_reopens_after_last_handle_drops() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let first = FileSurface::open_shared(&path, None).unwrap();
        first.set_item("k", "v".into()).unwrap();
        let weak = Arc::downgrade(&first);
        drop(first);
        assert!(weak.upgrade().is_none());

        let reopened = FileSurface::open_shared(&path, None).unwrap();
        assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_remove_items_batch() {
        let dir = tempdir().unwrap();
        let surface = FileSurface::open(dir.path().join("c.json"), None).unwrap();
        for key in ["a", "b", "c"] {
            surface.set_item(key, "x".into()).unwrap();
        }

        let removed = surface
            .remove_items(&["a".to_string(), "c".to_string(), "zz".to_string()])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(surface.used_bytes(), 2);
    }
}
