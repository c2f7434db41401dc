//! Import pipeline: file name -> cache lookup -> load or transform-and-store
//! -> externally visible projection.
//!
//! The pipeline never touches the [`MetadataIndex`]; callers record a
//! successful import with [`ImportedSeries::record`].

use std::path::Path;

use crate::cache::{CacheKey, SeriesCache};
use crate::config::AppConfig;
use crate::csv_processor;
use crate::error::{Error, Result};
use crate::file_name::{self, Interval};
use crate::metadata::MetadataIndex;
use crate::series::ImportedBar;

/// Where the returned series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

/// A complete import result.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSeries {
    pub bars: Vec<ImportedBar>,
    pub symbol: String,
    pub interval: Interval,
    /// Taken from the file name, also on a cache hit.
    pub start: chrono::NaiveDateTime,
    pub end: chrono::NaiveDateTime,
    pub outcome: CacheOutcome,
    /// Numeric cells turned into missing values (always 0 on a cache hit).
    pub coerced_cells: usize,
}

impl ImportedSeries {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.symbol.clone(), self.interval.clone())
    }

    /// Adds this import to the metadata index.
    pub fn record(&self, index: &mut MetadataIndex, file_path: &Path) -> Result<()> {
        index.update(
            &self.symbol,
            &self.interval,
            self.start.date(),
            self.end.date(),
            &file_path.to_string_lossy(),
        )
    }
}

/// Import pipeline bound to one configuration and one cache.
pub struct ImportPipeline<'a> {
    config: &'a AppConfig,
    cache: &'a SeriesCache,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(config: &'a AppConfig, cache: &'a SeriesCache) -> Self {
        ImportPipeline { config, cache }
    }

    /// Imports one price-history file, serving it from the cache when possible.
    ///
    /// This function:
    /// 1. Parses the file name into symbol, interval and span.
    /// 2. Loads the series from the cache when a complete entry exists.
    /// 3. Otherwise transforms the CSV and stores the result in the cache.
    /// 4. Projects the series to the externally visible bar shape.
    ///
    /// Start and end always come from the file name, also on a cache hit.
    /// The metadata index is not touched; see [`ImportedSeries::record`].
    ///
    /// # Arguments
    /// * `file_path` - Path to a `<SYMBOL>_<INTERVAL>_<START>_<END>.csv` file.
    ///
    /// # Returns
    /// * `Result<ImportedSeries>` - The complete series with its identifying fields.
    ///
    /// # Errors
    /// * [`Error::Format`] if the name does not match; nothing is written.
    /// * [`Error::CacheCorrupt`] if an existing entry cannot be read back.
    /// * [`Error::InvalidRow`], [`Error::Csv`] or [`Error::Io`] from reading the CSV.
    pub fn import<P: AsRef<Path>>(&self, file_path: P) -> Result<ImportedSeries> {
        let file_path = file_path.as_ref();
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Format {
                file_name: file_path.display().to_string(),
                reason: "path has no UTF-8 file name".to_string(),
            })?;
        let span = file_name::parse(file_name)?;
        let key = CacheKey::new(span.symbol.clone(), span.interval.clone());

        let (series, outcome, coerced_cells) = if self.cache.has(&key) {
            let series = self.cache.load(&key)?;
            tracing::info!(file = file_name, key = %key, "loaded from cache");
            (series, CacheOutcome::Hit, 0)
        } else {
            let (series, stats) = csv_processor::transform_file(file_path, self.config)?;
            self.cache.store(&key, &series, span.start, span.end)?;
            if stats.coerced_cells > 0 {
                tracing::warn!(
                    file = file_name,
                    cells = stats.coerced_cells,
                    "numeric cells recorded as missing"
                );
            }
            tracing::info!(file = file_name, key = %key, rows = stats.rows, "imported and cached");
            (series, CacheOutcome::Miss, stats.coerced_cells)
        };

        Ok(ImportedSeries {
            bars: series.project(),
            symbol: span.symbol,
            interval: span.interval,
            start: span.start,
            end: span.end,
            outcome,
            coerced_cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: &str = "<DATE>\t<TIME>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\t<TICKVOL>\t<VOL>\t<SPREAD>\n\
        2024.01.01\t00:00:00\t1.1000\t1.1010\t1.0990\t1.1005\t10\t0\t1\n\
        2024.01.01\t00:05:00\t1.1005\t1.1008\t1.0995\t1.0999\t12\t0\t1\n";

    #[test]
    fn bad_file_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let cache = SeriesCache::open(dir.path().join("cache")).unwrap();
        let path = dir.path().join("EURUSD_H1_202401010000_202401020000.csv");
        std::fs::write(&path, ROWS).unwrap();

        let err = ImportPipeline::new(&config, &cache).import(&path).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
        assert!(cache.keys().unwrap().is_empty());
    }

    #[test]
    fn miss_then_hit_returns_same_series() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let cache = SeriesCache::open(dir.path().join("cache")).unwrap();
        let path = dir.path().join("EURUSD_M5_202401010000_202401020000.csv");
        std::fs::write(&path, ROWS).unwrap();

        let pipeline = ImportPipeline::new(&config, &cache);
        let first = pipeline.import(&path).unwrap();
        assert_eq!(first.outcome, CacheOutcome::Miss);
        assert_eq!(first.bars.len(), 2);

        let second = pipeline.import(&path).unwrap();
        assert_eq!(second.outcome, CacheOutcome::Hit);
        assert_eq!(second.bars, first.bars);
        assert_eq!(second.start, first.start);
    }

    #[test]
    fn corrupt_cache_entry_is_a_hard_stop() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let cache = SeriesCache::open(dir.path().join("cache")).unwrap();
        let path = dir.path().join("EURUSD_M5_202401010000_202401020000.csv");
        std::fs::write(&path, ROWS).unwrap();

        let pipeline = ImportPipeline::new(&config, &cache);
        let first = pipeline.import(&path).unwrap();
        std::fs::write(cache.artifact_path(&first.key()), b"garbage!garbage!").unwrap();

        let err = pipeline.import(&path).unwrap_err();
        assert!(matches!(err, Error::CacheCorrupt { .. }), "{err}");
    }

    #[test]
    fn missing_source_on_miss_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let cache = SeriesCache::open(dir.path().join("cache")).unwrap();
        let path = dir.path().join("EURUSD_M5_202401010000_202401020000.csv");

        let err = ImportPipeline::new(&config, &cache).import(&path).unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err}");
        assert!(!cache.has(&CacheKey::new("EURUSD", "M5".parse().unwrap())));
    }
}
