use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::series::{Bar, Direction, NormalizedSeries};

/// Column positions resolved once from the configured column list.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    tick_volume: Option<usize>,
    volume: Option<usize>,
    spread: Option<usize>,
}

impl ColumnMap {
    fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(ColumnMap {
            date: config.column_position("DATE")?,
            time: config.column_position("TIME")?,
            open: config.column_position("OPEN")?,
            high: config.column_position("HIGH")?,
            low: config.column_position("LOW")?,
            close: config.column_position("CLOSE")?,
            tick_volume: config.optional_column_position("TICKVOL"),
            volume: config.optional_column_position("VOL"),
            spread: config.optional_column_position("SPREAD"),
        })
    }

    /// Column names stored in the artifact for this layout.
    fn stored_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = [
            "timestamp", "date", "time", "open", "high", "low", "close", "direction",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        for (present, name) in [
            (self.tick_volume, "tick_volume"),
            (self.volume, "volume"),
            (self.spread, "spread"),
        ] {
            if present.is_some() {
                columns.push(name.to_string());
            }
        }
        columns
    }
}

/// One ingested row, borrowed from the CSV record it came from.
#[derive(Debug)]
pub struct RawRecord<'a> {
    pub date: &'a str,
    pub time: &'a str,
    pub open: &'a str,
    pub high: &'a str,
    pub low: &'a str,
    pub close: &'a str,
    pub tick_volume: Option<&'a str>,
    pub volume: Option<&'a str>,
    pub spread: Option<&'a str>,
}

impl<'a> RawRecord<'a> {
    fn from_record(record: &'a csv::StringRecord, map: &ColumnMap) -> Self {
        let cell = move |i: usize| record.get(i).unwrap_or("");
        RawRecord {
            date: cell(map.date),
            time: cell(map.time),
            open: cell(map.open),
            high: cell(map.high),
            low: cell(map.low),
            close: cell(map.close),
            tick_volume: map.tick_volume.map(cell),
            volume: map.volume.map(cell),
            spread: map.spread.map(cell),
        }
    }
}

/// Counters collected while transforming one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransformStats {
    pub rows: usize,
    /// Non-empty numeric cells that could not be parsed and became missing.
    pub coerced_cells: usize,
}

/// Reads delimited rows and turns them into a [`NormalizedSeries`].
///
/// The first row is always skipped. Bars keep file order. Numeric cells that
/// fail to parse become `None` and are counted; a date/time that does not
/// match `date_format` fails the whole file with [`Error::InvalidRow`].
///
/// # Arguments
/// * `input` - Any reader over the delimited text.
/// * `config` - Delimiter, column order and date format.
///
/// # Returns
/// * `Result<(NormalizedSeries, TransformStats)>` - The series and its row and
///   coercion counters.
///
/// # Errors
/// * [`Error::Config`] or [`Error::MissingColumn`] for an unusable config.
/// * [`Error::Csv`] if the input is not readable as delimited text.
/// * [`Error::InvalidRow`] for a bad date or time.
pub fn transform_reader<R: std::io::Read>(
    input: R,
    config: &AppConfig,
) -> Result<(NormalizedSeries, TransformStats)> {
    let map = ColumnMap::from_config(config)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter_byte()?)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut stats = TransformStats::default();
    let mut bars = Vec::new();
    let mut record = csv::StringRecord::new();

    while reader.read_record(&mut record)? {
        let line = record.position().map_or(0, |p| p.line());
        let raw = RawRecord::from_record(&record, &map);
        bars.push(transform_record(&raw, line, config, &mut stats)?);
        stats.rows += 1;
    }

    Ok((
        NormalizedSeries::from_bars(bars, map.stored_columns()),
        stats,
    ))
}

pub fn transform_file<P: AsRef<std::path::Path>>(
    path: P,
    config: &AppConfig,
) -> Result<(NormalizedSeries, TransformStats)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    transform_reader(std::io::BufReader::new(file), config)
}

fn transform_record(
    raw: &RawRecord<'_>,
    line: u64,
    config: &AppConfig,
    stats: &mut TransformStats,
) -> Result<Bar> {
    let merged = format!("{} {}", raw.date, raw.time);
    let timestamp = chrono::NaiveDateTime::parse_from_str(&merged, &config.date_format)
        .map_err(|e| Error::InvalidRow {
            line,
            reason: format!("cannot parse `{merged}` with `{}`: {e}", config.date_format),
        })?;

    let mut coerce = |column: &str, cell: &str| -> Option<f64> {
        let value = coerce_number(cell);
        if value.is_none() && !cell.is_empty() {
            stats.coerced_cells += 1;
            tracing::warn!(line, column, cell, "non-numeric value recorded as missing");
        }
        value
    };

    let open = coerce("OPEN", raw.open);
    let high = coerce("HIGH", raw.high);
    let low = coerce("LOW", raw.low);
    let close = coerce("CLOSE", raw.close);
    let tick_volume = raw.tick_volume.and_then(|c| coerce("TICKVOL", c));
    let volume = raw.volume.and_then(|c| coerce("VOL", c));
    let spread = raw.spread.and_then(|c| coerce("SPREAD", c));

    Ok(Bar {
        timestamp,
        date: timestamp.date(),
        time: raw.time.to_string(),
        open,
        high,
        low,
        close,
        direction: Direction::from_prices(open, close),
        tick_volume,
        volume,
        spread,
    })
}

/// Parses a numeric cell; empty, malformed and NaN cells are missing.
pub fn coerce_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}
