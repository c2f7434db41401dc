//! On-disk series cache.
//!
//! Each entry is a pair under the cache root:
//! - `data/<SYMBOL>_<INTERVAL>.bin`: magic header followed by a bincode
//!   encoded [`SeriesColumns`], read back through a memory map.
//! - `meta/<SYMBOL>_<INTERVAL>.json`: the [`CacheDescriptor`] sidecar.
//!
//! An entry counts as present only when both files exist.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::file_name::Interval;
use crate::series::{NormalizedSeries, SeriesColumns};
use crate::utils;

const MAGIC: &[u8; 8] = b"OHLCCOL1";

/// Identifies one cached series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub symbol: String,
    pub interval: Interval,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        CacheKey {
            symbol: symbol.into(),
            interval,
        }
    }

    /// `<SYMBOL>_<INTERVAL>`, shared by artifact, descriptor and index entries.
    pub fn name(&self) -> String {
        format!("{}_{}", self.symbol, self.interval)
    }

    fn from_name(name: &str) -> Option<Self> {
        let (symbol, interval) = name.rsplit_once('_')?;
        if symbol.is_empty() {
            return None;
        }
        Some(CacheKey::new(symbol, interval.parse().ok()?))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.symbol, self.interval)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DescriptorStats {
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Sidecar describing a cached artifact.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheDescriptor {
    pub filename: String,
    pub symbol: String,
    pub timeframe: Interval,
    pub start_datetime: chrono::NaiveDateTime,
    pub end_datetime: chrono::NaiveDateTime,
    pub last_accessed: chrono::NaiveDateTime,
    pub stats: DescriptorStats,
}

#[derive(Debug, Clone)]
pub struct SeriesCache {
    data_dir: PathBuf,
    meta_dir: PathBuf,
}

impl SeriesCache {
    /// Opens the cache rooted at `root`, creating `data/` and `meta/` if absent.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let cache = SeriesCache {
            data_dir: root.join("data"),
            meta_dir: root.join("meta"),
        };
        for dir in [&cache.data_dir, &cache.meta_dir] {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(cache)
    }

    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.data_dir.join(format!("{}.bin", key.name()))
    }

    pub fn descriptor_path(&self, key: &CacheKey) -> PathBuf {
        self.meta_dir.join(format!("{}.json", key.name()))
    }

    /// Hit only when both artifact and descriptor exist.
    pub fn has(&self, key: &CacheKey) -> bool {
        self.artifact_path(key).is_file() && self.descriptor_path(key).is_file()
    }

    /// Reads a cached series back through a memory map.
    ///
    /// The artifact is the `OHLCCOL1` magic followed by bincode-encoded
    /// [`SeriesColumns`]; the columns are checked for equal lengths and a
    /// day-run index that tiles the rows before bars are rebuilt.
    ///
    /// # Arguments
    /// * `key` - Symbol and interval of the entry.
    ///
    /// # Returns
    /// * `Result<NormalizedSeries>` - The bars in their original file order.
    ///
    /// # Errors
    /// * [`Error::Io`] if the artifact cannot be opened or mapped.
    /// * [`Error::CacheCorrupt`] on a short file, wrong magic, undecodable
    ///   payload or inconsistent columns.
    pub fn load(&self, key: &CacheKey) -> Result<NormalizedSeries> {
        let path = self.artifact_path(key);
        let file = std::fs::File::open(&path).map_err(|e| Error::io(&path, e))?;
        let len = file.metadata().map_err(|e| Error::io(&path, e))?.len();
        if len < MAGIC.len() as u64 {
            return Err(Error::corrupt(&path, "artifact shorter than header"));
        }

        // SAFETY: cache files are only replaced by rename, never modified in place.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| Error::io(&path, e))?;
        let (header, payload) = mmap.split_at(MAGIC.len());
        if header != MAGIC {
            return Err(Error::corrupt(&path, "unexpected header"));
        }
        let columns: SeriesColumns =
            bincode::deserialize(payload).map_err(|e| Error::corrupt(&path, e))?;
        let series = columns
            .into_series()
            .map_err(|reason| Error::corrupt(&path, reason))?;

        tracing::debug!(key = %key, rows = series.len(), "loaded series from cache");
        Ok(series)
    }

    pub fn descriptor(&self, key: &CacheKey) -> Result<CacheDescriptor> {
        let path = self.descriptor_path(key);
        let data = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::from_slice(&data).map_err(|e| Error::corrupt(&path, e))
    }

    /// Writes artifact then descriptor as one logical entry.
    ///
    /// Both files are written to a temporary sibling and renamed into place.
    /// If the descriptor cannot be written the fresh artifact is removed
    /// again so the entry stays a miss.
    ///
    /// # Arguments
    /// * `key` - Symbol and interval of the entry.
    /// * `series` - Normalized bars to persist.
    /// * `start`, `end` - Span taken from the source file name.
    ///
    /// # Returns
    /// * `Result<CacheDescriptor>` - The descriptor as written to `meta/`.
    ///
    /// # Errors
    /// * [`Error::Encode`] if the columns cannot be serialized.
    /// * [`Error::Io`] if either file cannot be written.
    pub fn store(
        &self,
        key: &CacheKey,
        series: &NormalizedSeries,
        start: chrono::NaiveDateTime,
        end: chrono::NaiveDateTime,
    ) -> Result<CacheDescriptor> {
        let artifact = self.artifact_path(key);
        let mut payload = MAGIC.to_vec();
        bincode::serialize_into(&mut payload, &SeriesColumns::from_series(series))?;
        utils::write_replace(&artifact, &payload).map_err(|e| Error::io(&artifact, e))?;

        let descriptor = CacheDescriptor {
            filename: format!("{}.bin", key.name()),
            symbol: key.symbol.clone(),
            timeframe: key.interval.clone(),
            start_datetime: start,
            end_datetime: end,
            last_accessed: now_seconds(),
            stats: DescriptorStats {
                rows: series.len(),
                columns: series.columns.clone(),
            },
        };

        let written = serde_json::to_vec_pretty(&descriptor)
            .map_err(Error::from)
            .and_then(|data| {
                let path = self.descriptor_path(key);
                utils::write_replace(&path, &data).map_err(|e| Error::io(&path, e))
            });
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&artifact) {
                tracing::error!(path = %artifact.display(), error = %cleanup, "failed to remove orphaned artifact");
            }
            return Err(e);
        }

        tracing::info!(key = %key, rows = series.len(), "stored series in cache");
        Ok(descriptor)
    }

    /// Keys of all complete entries, sorted by symbol then interval.
    pub fn keys(&self) -> Result<Vec<CacheKey>> {
        let entries = std::fs::read_dir(&self.meta_dir).map_err(|e| Error::io(&self.meta_dir, e))?;
        let mut keys: Vec<CacheKey> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension()? != "json" {
                    return None;
                }
                CacheKey::from_name(path.file_stem()?.to_str()?)
            })
            .filter(|key| self.has(key))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn now_seconds() -> chrono::NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    chrono::Timelike::with_nanosecond(&now, 0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::tests::bar;

    fn key() -> CacheKey {
        CacheKey::new("EURUSD", "M5".parse().unwrap())
    }

    fn series() -> NormalizedSeries {
        NormalizedSeries::from_bars(
            vec![bar(1, 9, Some(1.0), Some(1.1)), bar(2, 9, None, Some(1.0))],
            vec!["timestamp".into(), "close".into()],
        )
    }

    fn span() -> (chrono::NaiveDateTime, chrono::NaiveDateTime) {
        let d = |day| {
            chrono::NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        (d(1), d(2))
    }

    #[test]
    fn open_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        SeriesCache::open(dir.path().join("cache")).unwrap();
        assert!(dir.path().join("cache/data").is_dir());
        assert!(dir.path().join("cache/meta").is_dir());
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::open(dir.path()).unwrap();
        assert!(!cache.has(&key()));

        let (start, end) = span();
        let descriptor = cache.store(&key(), &series(), start, end).unwrap();
        assert!(cache.has(&key()));
        assert_eq!(descriptor.filename, "EURUSD_M5.bin");
        assert_eq!(descriptor.stats.rows, 2);
        assert_eq!(cache.descriptor(&key()).unwrap(), descriptor);
        assert_eq!(cache.load(&key()).unwrap(), series());
        assert_eq!(cache.keys().unwrap(), vec![key()]);
    }

    #[test]
    fn descriptor_uses_iso_datetimes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::open(dir.path()).unwrap();
        let (start, end) = span();
        cache.store(&key(), &series(), start, end).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(cache.descriptor_path(&key())).unwrap()).unwrap();
        assert_eq!(raw["start_datetime"], "2024-01-01T00:00:00");
        assert_eq!(raw["timeframe"], "M5");
        assert_eq!(raw["stats"]["rows"], 2);
    }

    #[test]
    fn partial_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::open(dir.path()).unwrap();
        let (start, end) = span();
        cache.store(&key(), &series(), start, end).unwrap();

        std::fs::remove_file(cache.descriptor_path(&key())).unwrap();
        assert!(!cache.has(&key()));
        assert!(cache.keys().unwrap().is_empty());
    }

    #[test]
    fn failed_descriptor_write_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::open(dir.path()).unwrap();
        // a directory where the descriptor should go makes the rename fail
        std::fs::create_dir_all(cache.descriptor_path(&key())).unwrap();
        std::fs::write(cache.descriptor_path(&key()).join("blocker"), b"x").unwrap();

        let (start, end) = span();
        let err = cache.store(&key(), &series(), start, end).unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err}");
        assert!(!cache.artifact_path(&key()).exists());
    }

    #[test]
    fn garbage_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::open(dir.path()).unwrap();
        let (start, end) = span();
        cache.store(&key(), &series(), start, end).unwrap();

        std::fs::write(cache.artifact_path(&key()), b"OHLCCOL1\xff\xff").unwrap();
        assert!(matches!(cache.load(&key()), Err(Error::CacheCorrupt { .. })));

        std::fs::write(cache.artifact_path(&key()), b"PAR1").unwrap();
        assert!(matches!(cache.load(&key()), Err(Error::CacheCorrupt { .. })));

        std::fs::write(cache.artifact_path(&key()), b"NOTMAGIC-and-more").unwrap();
        assert!(matches!(cache.load(&key()), Err(Error::CacheCorrupt { .. })));
    }

    #[test]
    fn truncated_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::open(dir.path()).unwrap();
        let (start, end) = span();
        cache.store(&key(), &series(), start, end).unwrap();

        let path = cache.artifact_path(&key());
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(cache.load(&key()), Err(Error::CacheCorrupt { .. })));
    }

    #[test]
    fn key_name_parses_back() {
        let parsed = CacheKey::from_name("EUR_USD_M15").unwrap();
        assert_eq!(parsed.symbol, "EUR_USD");
        assert_eq!(parsed.interval.as_str(), "M15");
        assert!(CacheKey::from_name("EURUSD").is_none());
        assert!(CacheKey::from_name("_M5").is_none());
    }
}
