//! Freshness-checked index loading with at most one rebuild per file.

use crate::builder::index_file;
use crate::error::{IndexError, Result};
use crate::model::{CollectionIndex, FileIndex, SourceFile};
use crate::persist;
use lru::LruCache;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, info, warn};

/// Per-file results kept in memory when no capacity is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Rescan every file, ignoring the sidecar and earlier results.
    pub force: bool,
    /// Most recently used per-file indexes kept in memory.
    pub cache_capacity: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            force: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl IndexOptions {
    /// Load options from environment variables.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("GRIB_INDEX_FORCE") {
            options.force = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = std::env::var("GRIB_INDEX_CACHE_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                options.cache_capacity = capacity;
            }
        }

        options
    }
}

type Gate = Arc<Mutex<()>>;

/// Loads collection indexes, rescanning only files whose stat changed.
///
/// Each file path (and each sidecar) has its own gate: concurrent callers
/// that need the same file wait for the one rebuild in flight and then find
/// its result in the cache. A gate lives only while someone holds it, and
/// the cache is bounded by [`IndexOptions::cache_capacity`].
pub struct Indexer {
    options: IndexOptions,
    gates: Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>,
    cache: Mutex<LruCache<PathBuf, Arc<FileIndex>>>,
    rescans: AtomicUsize,
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new(IndexOptions::default())
    }
}

impl fmt::Debug for Indexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Indexer")
            .field("options", &self.options)
            .field("gates", &self.gate_count())
            .field("cached", &self.cached_count())
            .field("rescans", &self.rescans())
            .finish()
    }
}

impl Indexer {
    pub fn new(options: IndexOptions) -> Self {
        let capacity = NonZeroUsize::new(options.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            options,
            gates: Mutex::new(HashMap::new()),
            cache: Mutex::new(LruCache::new(capacity)),
            rescans: AtomicUsize::new(0),
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Number of files scanned by this indexer so far.
    pub fn rescans(&self) -> usize {
        self.rescans.load(Ordering::SeqCst)
    }

    /// Gates currently held by a caller.
    pub fn gate_count(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Per-file indexes held in memory.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn gate(&self, key: &Path) -> Gate {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(gate) = gates.get(key).and_then(Weak::upgrade) {
            return gate;
        }
        let gate = Gate::default();
        gates.insert(key.to_path_buf(), Arc::downgrade(&gate));
        gate
    }

    /// Run `f` while holding the gate of `key`, then drop the gate entry if
    /// nobody else holds it.
    fn gated<T>(&self, key: &Path, f: impl FnOnce() -> T) -> T {
        let gate = self.gate(key);
        let result = {
            let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        drop(gate);
        if gates.get(key).is_some_and(|weak| weak.strong_count() == 0) {
            gates.remove(key);
        }
        result
    }

    fn cached(&self, path: &Path, current: &SourceFile) -> Option<Arc<FileIndex>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(path).filter(|c| c.source == *current).cloned()
    }

    fn remember(&self, path: &Path, index: Arc<FileIndex>) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(path.to_path_buf(), index);
    }

    /// Index of one file, reusing `persisted` or an earlier result when the
    /// file is unchanged. Returns whether the file was rescanned.
    pub fn refresh_file(
        &self,
        path: &Path,
        persisted: Option<&FileIndex>,
    ) -> Result<(Arc<FileIndex>, bool)> {
        self.gated(path, || self.refresh_locked(path, persisted))
    }

    fn refresh_locked(
        &self,
        path: &Path,
        persisted: Option<&FileIndex>,
    ) -> Result<(Arc<FileIndex>, bool)> {
        let stale_error = |source: IndexError| IndexError::StaleIndexRebuildFailure {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        let current = SourceFile::stat(path).map_err(stale_error)?;

        if !self.options.force {
            if let Some(cached) = self.cached(path, &current) {
                return Ok((cached, false));
            }
            if let Some(persisted) = persisted.filter(|p| p.source == current) {
                let index = Arc::new(persisted.clone());
                self.remember(path, index.clone());
                return Ok((index, false));
            }
        }

        debug!(path = %path.display(), "rescanning stale file");
        let index = Arc::new(index_file(path).map_err(stale_error)?);
        self.rescans.fetch_add(1, Ordering::SeqCst);
        counter!("grib2_index_rescans_total").increment(1);
        self.remember(path, index.clone());
        Ok((index, true))
    }

    /// Index of `paths` backed by the sidecar at `sidecar`.
    ///
    /// The sidecar is rewritten only when a file was rescanned or the set of
    /// files changed. Any failure leaves the existing sidecar untouched.
    ///
    /// Callers sharing a sidecar are serialised, so a second caller reads
    /// what the first one wrote.
    pub fn load_or_rebuild(&self, paths: &[PathBuf], sidecar: &Path) -> Result<CollectionIndex> {
        self.gated(sidecar, || self.load_or_rebuild_locked(paths, sidecar))
    }

    fn load_or_rebuild_locked(&self, paths: &[PathBuf], sidecar: &Path) -> Result<CollectionIndex> {
        let persisted: HashMap<PathBuf, FileIndex> = if self.options.force {
            HashMap::new()
        } else {
            persist::load(sidecar)
                .unwrap_or_default()
                .into_iter()
                .map(|f| (f.source.path.clone(), f))
                .collect()
        };

        let mut files = Vec::with_capacity(paths.len());
        let mut changed = persisted.len() != paths.len();
        for path in paths {
            let previous = persisted.get(path);
            let (index, rescanned) = self.refresh_file(path, previous)?;
            changed |= rescanned || previous.map_or(true, |p| p.source != index.source);
            files.push(index);
        }

        let collection = CollectionIndex::from_files(files)?;

        if changed {
            persist::save(sidecar, collection.files())?;
        } else {
            debug!(sidecar = %sidecar.display(), "index sidecar is fresh");
        }

        info!(
            files = paths.len(),
            records = collection.record_count(),
            grids = collection.unique_grid_count(),
            rescans = self.rescans(),
            "index ready"
        );
        Ok(collection)
    }

    /// Drop every cached per-file result.
    pub fn clear(&self) {
        match self.cache.lock() {
            Ok(mut cache) => cache.clear(),
            Err(e) => {
                warn!("index cache poisoned, clearing anyway");
                e.into_inner().clear();
            }
        }
    }
}
