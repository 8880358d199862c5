//! EXIF capture-time cache for incremental builds.
//!
//! Reading EXIF means opening every source image, which dominates the scan
//! stage of a large site. The cache is created once per build and handed to
//! the scanner explicitly; nothing about it is global.
//!
//! # Semantics
//!
//! [`ExifCache::get_or_compute`] is single-flight per key: when several
//! workers ask for the same source path at once, exactly one runs the decode
//! and the rest block on that key's slot and share the result. Different keys
//! never wait on each other. Once a key has a value it is never invalidated
//! for the rest of the build.
//!
//! ## Storage
//!
//! Between builds the cache lives at `<cache_dir>/exif-cache.json`. Every
//! entry remembers the source file's mtime (whole seconds); a stored entry is
//! only reused when the mtime still matches. A missing, corrupt or
//! version-mismatched file loads as an empty cache. [`ExifCache::save`] writes
//! only the entries touched during the current build, so deleted images drop
//! out on their own.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Name of the cache file within the cache directory.
pub const CACHE_FILENAME: &str = "exif-cache.json";

/// Bump to invalidate every existing cache file.
const CACHE_VERSION: u32 = 1;

/// EXIF fields the build uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifData {
    pub capture_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    mtime: u64,
    #[serde(flatten)]
    data: ExifData,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, StoredEntry>,
}

/// One key's slot. The mutex is held for the whole compute, which is what
/// makes concurrent lookups of the same key wait instead of decoding twice.
#[derive(Debug)]
struct Slot {
    mtime: u64,
    value: Mutex<Option<ExifData>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Build-scoped, single-flight EXIF cache.
#[derive(Debug, Default)]
pub struct ExifCache {
    /// Entries loaded from disk. Read-only during the build.
    stored: HashMap<String, StoredEntry>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    cached: AtomicU32,
    read: AtomicU32,
}

impl ExifCache {
    /// An empty cache that starts without any stored entries.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from the cache directory. Falls back to an empty cache when the
    /// file is missing or unusable.
    pub fn load(cache_dir: &Path) -> Self {
        let path = cache_path(cache_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::in_memory(),
        };
        let file: CacheFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!("Ignoring unreadable EXIF cache {}: {}", path.display(), e);
                return Self::in_memory();
            }
        };
        if file.version != CACHE_VERSION {
            tracing::debug!(
                "Ignoring EXIF cache {} with version {}",
                path.display(),
                file.version
            );
            return Self::in_memory();
        }
        Self {
            stored: file.entries.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Write every entry resolved during this build to the cache directory.
    pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
        let entries: BTreeMap<String, StoredEntry> = lock(&self.slots)
            .iter()
            .filter_map(|(key, slot)| {
                lock(&slot.value).clone().map(|data| {
                    (
                        key.clone(),
                        StoredEntry {
                            mtime: slot.mtime,
                            data,
                        },
                    )
                })
            })
            .collect();
        let file = CacheFile {
            version: CACHE_VERSION,
            entries,
        };
        std::fs::create_dir_all(cache_dir)?;
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(cache_path(cache_dir), json)
    }

    /// Return the EXIF data for `key`, running `compute` at most once per key
    /// per build.
    ///
    /// A stored entry from a previous build is used instead of `compute` when
    /// its mtime equals `mtime`. Errors from `compute` are returned to the
    /// caller and not cached.
    pub fn get_or_compute<F, E>(&self, key: &str, mtime: u64, compute: F) -> Result<ExifData, E>
    where
        F: FnOnce() -> Result<ExifData, E>,
    {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key.to_string()).or_insert_with(|| {
                Arc::new(Slot {
                    mtime,
                    value: Mutex::new(None),
                })
            }))
        };

        let mut value = lock(&slot.value);
        if let Some(data) = value.as_ref() {
            return Ok(data.clone());
        }

        let data = match self.stored.get(key) {
            Some(entry) if entry.mtime == slot.mtime => {
                self.cached.fetch_add(1, Ordering::Relaxed);
                entry.data.clone()
            }
            _ => {
                let data = compute()?;
                self.read.fetch_add(1, Ordering::Relaxed);
                data
            }
        };
        *value = Some(data.clone());
        Ok(data)
    }

    /// Whether this build will have to read EXIF for at least one of `keys`.
    pub fn needs_reads<'a>(&self, keys: impl IntoIterator<Item = (&'a str, u64)>) -> bool {
        keys.into_iter()
            .any(|(key, mtime)| !matches!(self.stored.get(key), Some(e) if e.mtime == mtime))
    }

    pub fn stats(&self) -> ExifCacheStats {
        ExifCacheStats {
            cached: self.cached.load(Ordering::Relaxed),
            read: self.read.load(Ordering::Relaxed),
        }
    }
}

/// Resolve the cache file path for a cache directory.
pub fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CACHE_FILENAME)
}

/// How EXIF lookups were served during a build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExifCacheStats {
    pub cached: u32,
    pub read: u32,
}

impl ExifCacheStats {
    pub fn total(&self) -> u32 {
        self.cached + self.read
    }
}

impl fmt::Display for ExifCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cached > 0 {
            write!(
                f,
                "{} cached, {} read ({} total)",
                self.cached,
                self.read,
                self.total()
            )
        } else {
            write!(f, "{} read", self.read)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::dt;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    fn data(y: i32, m: u32, d: u32) -> ExifData {
        ExifData {
            capture_time: Some(dt(y, m, d, 12, 0, 0)),
        }
    }

    fn ok(d: ExifData) -> impl FnOnce() -> Result<ExifData, io::Error> {
        move || Ok(d)
    }

    // =========================================================================
    // get_or_compute
    // =========================================================================

    #[test]
    fn computes_once_per_key() {
        let cache = ExifCache::in_memory();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(data(2023, 5, 1))
        };

        let first = cache.get_or_compute("_galleries/a/1.jpg", 10, compute).unwrap();
        let second = cache.get_or_compute("_galleries/a/1.jpg", 10, compute).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), ExifCacheStats { cached: 0, read: 1 });
    }

    #[test]
    fn concurrent_lookups_share_one_decode() {
        let cache = ExifCache::in_memory();
        let calls = AtomicUsize::new(0);

        let results: Vec<ExifData> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        cache
                            .get_or_compute("_galleries/a/slow.jpg", 1, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(50));
                                Ok::<_, io::Error>(data(2020, 1, 2))
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == data(2020, 1, 2)));
    }

    #[test]
    fn distinct_keys_compute_separately() {
        let cache = ExifCache::in_memory();
        cache.get_or_compute("a.jpg", 1, ok(data(2020, 1, 1))).unwrap();
        cache.get_or_compute("b.jpg", 1, ok(ExifData::default())).unwrap();

        assert_eq!(cache.stats().read, 2);
        assert_eq!(
            cache.get_or_compute("b.jpg", 1, ok(data(1999, 1, 1))).unwrap(),
            ExifData::default()
        );
    }

    #[test]
    fn errors_are_returned_and_not_cached() {
        let cache = ExifCache::in_memory();
        let result = cache.get_or_compute("broken.jpg", 1, || {
            Err::<ExifData, _>(io::Error::other("unreadable"))
        });
        assert!(result.is_err());

        let retry = cache.get_or_compute("broken.jpg", 1, ok(data(2021, 3, 4))).unwrap();
        assert_eq!(retry, data(2021, 3, 4));
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn save_and_load_reuses_entries() {
        let tmp = TempDir::new().unwrap();
        let cache = ExifCache::in_memory();
        cache.get_or_compute("a.jpg", 100, ok(data(2023, 5, 1))).unwrap();
        cache.save(tmp.path()).unwrap();

        let loaded = ExifCache::load(tmp.path());
        let result = loaded
            .get_or_compute("a.jpg", 100, || -> Result<ExifData, io::Error> {
                panic!("should not decode a cached entry")
            })
            .unwrap();

        assert_eq!(result, data(2023, 5, 1));
        assert_eq!(loaded.stats(), ExifCacheStats { cached: 1, read: 0 });
    }

    #[test]
    fn changed_mtime_recomputes() {
        let tmp = TempDir::new().unwrap();
        let cache = ExifCache::in_memory();
        cache.get_or_compute("a.jpg", 100, ok(data(2023, 5, 1))).unwrap();
        cache.save(tmp.path()).unwrap();

        let loaded = ExifCache::load(tmp.path());
        let result = loaded.get_or_compute("a.jpg", 200, ok(data(2024, 6, 2))).unwrap();

        assert_eq!(result, data(2024, 6, 2));
        assert_eq!(loaded.stats().read, 1);
    }

    #[test]
    fn save_keeps_only_entries_touched_this_build() {
        let tmp = TempDir::new().unwrap();
        let first = ExifCache::in_memory();
        first.get_or_compute("keep.jpg", 1, ok(data(2020, 1, 1))).unwrap();
        first.get_or_compute("gone.jpg", 1, ok(data(2020, 1, 1))).unwrap();
        first.save(tmp.path()).unwrap();

        let second = ExifCache::load(tmp.path());
        second.get_or_compute("keep.jpg", 1, ok(ExifData::default())).unwrap();
        second.save(tmp.path()).unwrap();

        let content = fs::read_to_string(cache_path(tmp.path())).unwrap();
        assert!(content.contains("keep.jpg"));
        assert!(!content.contains("gone.jpg"));
    }

    #[test]
    fn needs_reads_reflects_stored_entries() {
        let tmp = TempDir::new().unwrap();
        let cache = ExifCache::in_memory();
        cache.get_or_compute("a.jpg", 5, ok(ExifData::default())).unwrap();
        cache.save(tmp.path()).unwrap();

        let loaded = ExifCache::load(tmp.path());
        assert!(!loaded.needs_reads([("a.jpg", 5)]));
        assert!(loaded.needs_reads([("a.jpg", 6)]));
        assert!(loaded.needs_reads([("a.jpg", 5), ("b.jpg", 5)]));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(ExifCache::load(tmp.path()).stored.is_empty());
    }

    #[test]
    fn load_corrupt_json_is_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(cache_path(tmp.path()), "not json").unwrap();
        assert!(ExifCache::load(tmp.path()).stored.is_empty());
    }

    #[test]
    fn load_wrong_version_is_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a.jpg": {{"mtime": 1, "capture_time": null}}}}}}"#,
            CACHE_VERSION + 1
        );
        fs::write(cache_path(tmp.path()), json).unwrap();
        assert!(ExifCache::load(tmp.path()).stored.is_empty());
    }

    #[test]
    fn save_creates_cache_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join(".gallery-cache");
        ExifCache::in_memory().save(&dir).unwrap();
        assert!(cache_path(&dir).exists());
    }

    // =========================================================================
    // Stats
    // =========================================================================

    #[test]
    fn stats_display_with_cached() {
        let s = ExifCacheStats { cached: 5, read: 2 };
        assert_eq!(s.to_string(), "5 cached, 2 read (7 total)");
    }

    #[test]
    fn stats_display_without_cached() {
        let s = ExifCacheStats { cached: 0, read: 3 };
        assert_eq!(s.to_string(), "3 read");
    }
}
