//! Persistent query → document title cache.
//!
//! The cache is a single JSON object on disk (`{"query": "title", ...}`)
//! mirrored by an in-memory map. Every write replaces the whole file before it
//! is acknowledged, so a successful `put` always leaves memory and disk equal.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Query → title mapping, iterated in lexical key order.
pub type CacheMap = BTreeMap<String, String>;

/// Errors raised by the query-title cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store exists but does not hold a JSON object of strings.
    ///
    /// Fatal: the store is never reset automatically since it holds user data.
    #[error("cache store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The store could not be read or created.
    #[error("failed to read cache store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The mapping could not be flushed to the store.
    #[error("failed to write cache store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Query-title cache backed by a JSON file.
///
/// `put` and `snapshot` are guarded by a read/write lock, and `put` holds the
/// write lock until the flush completes, so the cache can be shared across
/// threads without ever exposing a partially applied write.
#[derive(Debug)]
pub struct QueryTitleCache {
    path: PathBuf,
    entries: RwLock<CacheMap>,
}

impl QueryTitleCache {
    /// Loads the cache stored at `path`.
    ///
    /// A missing store is created containing `{}`. Parent directories are not
    /// created; see [`crate::utils::ensure_parent_directory`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupt`] if the file exists but is not a JSON
    /// object of strings, [`CacheError::Read`] if it cannot be read, and
    /// [`CacheError::Write`] if a missing store cannot be created.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            tracing::info!(path = %path.display(), "creating empty query-title cache");
            write_store(&path, &CacheMap::new())?;
        }

        let raw = fs::read_to_string(&path).map_err(|source| CacheError::Read {
            path: path.clone(),
            source,
        })?;
        let entries: CacheMap =
            serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), entries = entries.len(), "loaded query-title cache");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Returns the location of the durable store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or overwrites the title for `query` and flushes the whole
    /// mapping to disk.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Write`] if the flush fails. The in-memory entry is
    /// restored to its previous state before returning.
    pub fn put(&self, query: &str, title: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let previous = entries.insert(query.to_string(), title.to_string());

        if let Err(e) = write_store(&self.path, &entries) {
            match previous {
                Some(old) => entries.insert(query.to_string(), old),
                None => entries.remove(query),
            };
            tracing::warn!(query, error = %e, "rolled back cache entry after failed flush");
            return Err(e);
        }

        tracing::debug!(query, title, "cached query title");
        Ok(())
    }

    /// Returns a copy of the current mapping.
    pub fn snapshot(&self) -> CacheMap {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the cached title for exactly `query`, if any.
    pub fn get(&self, query: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query)
            .cloned()
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replaces the store with `entries` via a temp file renamed over the target.
fn write_store(path: &Path, entries: &CacheMap) -> Result<(), CacheError> {
    let write_err = |source: io::Error| CacheError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let json = serde_json::to_string_pretty(entries).map_err(|e| write_err(e.into()))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_creates_missing_store_as_empty_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = QueryTitleCache::load(&path).unwrap();

        assert!(cache.is_empty());
        assert!(path.exists());
        let on_disk: CacheMap =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(on_disk.is_empty());
    }

    #[test]
    fn load_reads_existing_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"capital of france": "Paris"}"#).unwrap();

        let cache = QueryTitleCache::load(&path).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("capital of france").as_deref(), Some("Paris"));
    }

    #[test]
    fn load_accepts_legacy_multiline_empty_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{\n}").unwrap();

        let cache = QueryTitleCache::load(&path).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn load_rejects_corrupt_store_without_resetting_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json at all").unwrap();

        let result = QueryTitleCache::load(&path);

        assert!(matches!(result, Err(CacheError::Corrupt { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json at all");
    }

    #[test]
    fn load_rejects_non_string_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"query": null}"#).unwrap();

        assert!(matches!(
            QueryTitleCache::load(&path),
            Err(CacheError::Corrupt { .. })
        ));
    }

    #[test]
    fn put_persists_before_returning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = QueryTitleCache::load(&path).unwrap();

        cache.put("When did Kurt Godel die?", "Kurt Gödel").unwrap();

        let reloaded = QueryTitleCache::load(&path).unwrap();
        assert_eq!(reloaded.snapshot(), cache.snapshot());
        assert_eq!(
            reloaded.get("When did Kurt Godel die?").as_deref(),
            Some("Kurt Gödel")
        );
    }

    #[test]
    fn put_overwrites_existing_query() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = QueryTitleCache::load(&path).unwrap();

        cache.put("q", "First").unwrap();
        cache.put("q", "Second").unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("q").as_deref(), Some("Second"));
    }

    #[test]
    fn failed_put_rolls_back_new_entry() {
        let dir = tempdir().unwrap();
        let store_dir = dir.path().join("store");
        fs::create_dir(&store_dir).unwrap();
        let path = store_dir.join("cache.json");
        let cache = QueryTitleCache::load(&path).unwrap();

        fs::remove_dir_all(&store_dir).unwrap();

        let result = cache.put("q", "Title");

        assert!(matches!(result, Err(CacheError::Write { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_put_restores_previous_title() {
        let dir = tempdir().unwrap();
        let store_dir = dir.path().join("store");
        fs::create_dir(&store_dir).unwrap();
        let path = store_dir.join("cache.json");
        let cache = QueryTitleCache::load(&path).unwrap();
        cache.put("q", "Original").unwrap();

        fs::remove_dir_all(&store_dir).unwrap();

        assert!(cache.put("q", "Replacement").is_err());
        assert_eq!(cache.get("q").as_deref(), Some("Original"));
    }

    #[test]
    fn snapshot_iterates_in_lexical_order() {
        let dir = tempdir().unwrap();
        let cache = QueryTitleCache::load(dir.path().join("cache.json")).unwrap();
        cache.put("zebra", "Z").unwrap();
        cache.put("apple", "A").unwrap();

        let keys: Vec<String> = cache.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["apple", "zebra"]);
    }
}
