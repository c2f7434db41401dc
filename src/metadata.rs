//! Process-wide record of everything imported so far.
//!
//! The document is rewritten in full after every update. Updates are applied
//! to a copy first and only become visible once the copy has been persisted,
//! so a failed write never leaves memory and disk disagreeing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::file_name::Interval;
use crate::utils;

/// Union of all imported calendar spans. Only ever widens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DateRange {
    pub start: Option<chrono::NaiveDate>,
    pub end: Option<chrono::NaiveDate>,
}

impl DateRange {
    pub fn widen(&mut self, start: chrono::NaiveDate, end: chrono::NaiveDate) {
        if self.start.is_none_or(|current| start < current) {
            self.start = Some(start);
        }
        if self.end.is_none_or(|current| end > current) {
            self.end = Some(end);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndexDocument {
    /// Sorted by interval magnitude, no duplicates.
    pub available_intervals: Vec<Interval>,
    pub symbols: BTreeSet<String>,
    pub date_range: DateRange,
    /// `"<SYMBOL>_<INTERVAL>"` -> source file path.
    pub files: IndexMap<String, String>,
}

impl IndexDocument {
    fn apply(
        &mut self,
        symbol: &str,
        interval: &Interval,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        file_path: &str,
    ) {
        // One label per minute count; the first label seen is kept.
        if !self
            .available_intervals
            .iter()
            .any(|known| known.sort_key() == interval.sort_key())
        {
            self.available_intervals.push(interval.clone());
        }
        self.available_intervals.sort_by_key(Interval::sort_key);

        self.symbols.insert(symbol.to_string());
        self.date_range.widen(start, end);
        self.files
            .insert(format!("{symbol}_{interval}"), file_path.to_string());
    }
}

#[derive(Debug)]
pub struct MetadataIndex {
    path: PathBuf,
    document: IndexDocument,
}

impl MetadataIndex {
    /// Loads the index at `path`; an absent file yields the empty document.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexDocument::default(),
            Err(e) => return Err(Error::io(&path, e)),
        };
        Ok(MetadataIndex { path, document })
    }

    pub fn document(&self) -> &IndexDocument {
        &self.document
    }

    pub fn available_intervals(&self) -> &[Interval] {
        &self.document.available_intervals
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.document.symbols.iter().map(String::as_str)
    }

    pub fn date_range(&self) -> DateRange {
        self.document.date_range
    }

    pub fn file_for(&self, symbol: &str, interval: &Interval) -> Option<&str> {
        self.document
            .files
            .get(&format!("{symbol}_{interval}"))
            .map(String::as_str)
    }

    /// Records one successful import and persists the whole document.
    ///
    /// The change is applied to a copy, written out in full, and only then
    /// committed in memory:
    /// 1. The interval joins the interval list, sorted by minutes.
    /// 2. The symbol joins the symbol set.
    /// 3. The date range widens to cover `start..=end`.
    /// 4. `files["<SYMBOL>_<INTERVAL>"]` is set to `file_path`.
    ///
    /// # Errors
    /// * [`Error::IndexPersist`] if the document cannot be written; the
    ///   in-memory index is then unchanged.
    pub fn update(
        &mut self,
        symbol: &str,
        interval: &Interval,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        file_path: &str,
    ) -> Result<()> {
        let mut next = self.document.clone();
        next.apply(symbol, interval, start, end, file_path);

        let data = serde_json::to_vec_pretty(&next)?;
        utils::write_replace(&self.path, &data).map_err(|source| Error::IndexPersist {
            path: self.path.clone(),
            source,
        })?;

        self.document = next;
        tracing::info!(
            symbol,
            interval = %interval,
            start = ?self.document.date_range.start,
            end = ?self.document.date_range.end,
            "metadata index updated"
        );
        Ok(())
    }
}
