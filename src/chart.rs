//! Chart assembly: cached series trimmed to a calendar window and projected
//! to `(timestamp, close)` points, one line per selected interval.

use std::path::PathBuf;

use crate::cache::{CacheKey, SeriesCache};
use crate::error::Result;
use crate::file_name::Interval;
use crate::series::ClosePoint;

/// Widest window the charting tool accepts, in days between start and end.
pub const MAX_WINDOW_DAYS: i64 = 5;

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateWindow {
    pub fn new(start: chrono::NaiveDate, end: chrono::NaiveDate) -> Self {
        DateWindow { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSelection {
    pub interval: Interval,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub interval: Interval,
    pub color: String,
    pub points: Vec<ClosePoint>,
}

/// A selected interval with no cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSeries {
    pub key: CacheKey,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartAssembly {
    pub series: Vec<ChartSeries>,
    pub missing: Vec<MissingSeries>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChartError {
    #[error("select at least one interval")]
    NothingSelected,
    #[error("date window {start}..{end} must span 0 to 5 days")]
    InvalidWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

/// A chart request that passed the tool's usability checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub symbol: String,
    pub selections: Vec<SeriesSelection>,
    pub window: DateWindow,
}

impl ChartRequest {
    /// Validates a chart request before any cache entry is read.
    ///
    /// # Errors
    /// * [`ChartError::NothingSelected`] for an empty selection.
    /// * [`ChartError::InvalidWindow`] if `end` precedes `start` or the window
    ///   spans more than [`MAX_WINDOW_DAYS`] days.
    pub fn new(
        symbol: impl Into<String>,
        selections: Vec<SeriesSelection>,
        window: DateWindow,
    ) -> std::result::Result<Self, ChartError> {
        if selections.is_empty() {
            return Err(ChartError::NothingSelected);
        }
        if window.end < window.start || window.days() > MAX_WINDOW_DAYS {
            return Err(ChartError::InvalidWindow {
                start: window.start,
                end: window.end,
            });
        }
        Ok(ChartRequest {
            symbol: symbol.into(),
            selections,
            window,
        })
    }
}

pub struct ChartAssembler<'a> {
    cache: &'a SeriesCache,
}

impl<'a> ChartAssembler<'a> {
    /// Creates an assembler reading from `cache`; it never writes to it.
    pub fn new(cache: &'a SeriesCache) -> Self {
        ChartAssembler { cache }
    }

    /// Builds one trimmed series per selection that has a cache entry.
    ///
    /// Any window is accepted here, including one that selects nothing;
    /// selections without an entry are listed in [`ChartAssembly::missing`].
    ///
    /// # Arguments
    /// * `active` - Intervals to chart, each with its line colour.
    /// * `window` - Inclusive calendar-date window.
    /// * `symbol` - Symbol whose cache entries are read.
    ///
    /// # Returns
    /// * `Result<ChartAssembly>` - Close points per series in selection order,
    ///   plus the selections that were skipped.
    ///
    /// # Errors
    /// * [`crate::Error::CacheCorrupt`] or [`crate::Error::Io`] if an existing
    ///   entry cannot be loaded.
    pub fn assemble(
        &self,
        active: &[SeriesSelection],
        window: DateWindow,
        symbol: &str,
    ) -> Result<ChartAssembly> {
        let mut assembly = ChartAssembly::default();

        for selection in active {
            let key = CacheKey::new(symbol, selection.interval.clone());
            if !self.cache.has(&key) {
                let path = self.cache.artifact_path(&key);
                tracing::warn!(key = %key, path = %path.display(), "series not cached, skipping");
                assembly.missing.push(MissingSeries { key, path });
                continue;
            }

            let series = self.cache.load(&key)?;
            let points: Vec<ClosePoint> = series
                .bars_in_window(window.start, window.end)
                .map(|bar| ClosePoint {
                    timestamp: bar.timestamp,
                    close: bar.close,
                })
                .collect();
            tracing::debug!(key = %key, points = points.len(), "series trimmed to window");

            assembly.series.push(ChartSeries {
                interval: selection.interval.clone(),
                color: selection.color.clone(),
                points,
            });
        }

        Ok(assembly)
    }

    pub fn assemble_request(&self, request: &ChartRequest) -> Result<ChartAssembly> {
        self.assemble(&request.selections, request.window, &request.symbol)
    }
}
