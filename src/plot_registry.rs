//! Registry of produced charts (`metaplot.json`) and the chart data export.
//!
//! A chart is identified by a short hash over its symbol, title and window,
//! so the same selection over the same dates always maps to the same entry.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use sha2::Digest;

use crate::chart::{ChartAssembly, DateWindow};
use crate::error::{Error, Result};
use crate::file_name::Interval;
use crate::utils;

const HASH_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlotEntry {
    #[serde(default)]
    pub symbol: String,
    pub title: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub created_at: chrono::NaiveDateTime,
}

/// `"Chart_M5_M15_"` for intervals M5 and M15, in selection order.
pub fn chart_title<'a, I>(intervals: I) -> String
where
    I: IntoIterator<Item = &'a Interval>,
{
    intervals
        .into_iter()
        .fold(String::from("Chart_"), |mut title, interval| {
            title.push_str(interval.as_str());
            title.push('_');
            title
        })
}

/// Short content hash naming a chart.
///
/// # Arguments
/// * `symbol` - Charted symbol, e.g. `EURUSD`.
/// * `title` - Title from [`chart_title`].
/// * `window` - Inclusive calendar-date window.
///
/// # Returns
/// * The first 8 hex characters of SHA-256 over symbol, title, start and end
///   (dates as `%Y-%m-%d`).
pub fn chart_hash(symbol: &str, title: &str, window: &DateWindow) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"\0");
    hasher.update(title.as_bytes());
    hasher.update(window.start.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(window.end.format("%Y-%m-%d").to_string().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(HASH_LEN);
    digest
}

#[derive(Debug)]
pub struct PlotRegistry {
    path: PathBuf,
    entries: IndexMap<String, PlotEntry>,
}

impl PlotRegistry {
    /// Loads the registry; an absent file yields an empty registry.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(Error::io(&path, e)),
        };
        Ok(PlotRegistry { path, entries })
    }

    pub fn entries(&self) -> &IndexMap<String, PlotEntry> {
        &self.entries
    }

    /// Records a chart and rewrites the registry file.
    ///
    /// The file is replaced as a whole; on failure the in-memory entries are
    /// left as they were.
    pub fn record(
        &mut self,
        hash: &str,
        symbol: &str,
        title: &str,
        window: &DateWindow,
    ) -> Result<()> {
        let entry = PlotEntry {
            symbol: symbol.to_string(),
            title: title.to_string(),
            start_date: window.start,
            end_date: window.end,
            created_at: chrono::Local::now().naive_local(),
        };
        let mut next = self.entries.clone();
        next.insert(hash.to_string(), entry);

        let data = serde_json::to_vec_pretty(&next)?;
        utils::write_replace(&self.path, &data).map_err(|e| Error::io(&self.path, e))?;
        self.entries = next;
        Ok(())
    }

    /// Exported chart files present in `plot_dir`, sorted by name.
    pub fn list_plots<P: AsRef<Path>>(plot_dir: P) -> Result<Vec<PathBuf>> {
        let plot_dir = plot_dir.as_ref();
        let entries = match std::fs::read_dir(plot_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(plot_dir, e)),
        };
        let mut plots: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        plots.sort();
        Ok(plots)
    }
}

#[derive(serde::Serialize)]
struct ExportRow<'a> {
    interval: &'a str,
    color: &'a str,
    timestamp: String,
    close: Option<f64>,
}

/// Writes the assembled chart points as CSV.
///
/// # Arguments
/// * `plot_dir` - Output directory, created if absent.
/// * `hash` - Chart hash from [`chart_hash`]; names the file.
/// * `assembly` - Series returned by the chart assembler.
///
/// # Returns
/// * Path of `<plot_dir>/<hash>.csv`, one `interval,color,timestamp,close`
///   row per point.
pub fn export_chart_data<P: AsRef<Path>>(
    plot_dir: P,
    hash: &str,
    assembly: &ChartAssembly,
) -> Result<PathBuf> {
    let plot_dir = plot_dir.as_ref();
    std::fs::create_dir_all(plot_dir).map_err(|e| Error::io(plot_dir, e))?;
    let path = plot_dir.join(format!("{hash}.csv"));

    let mut writer = csv::Writer::from_path(&path)?;
    for series in &assembly.series {
        for point in &series.points {
            writer.serialize(ExportRow {
                interval: series.interval.as_str(),
                color: &series.color,
                timestamp: utils::format_timestamp(&point.timestamp),
                close: point.close,
            })?;
        }
    }
    writer.flush().map_err(|e| Error::io(&path, e))?;
    Ok(path)
}
