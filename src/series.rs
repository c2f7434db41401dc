//! Typed time series produced by an import.
//!
//! [`NormalizedSeries`] is the in-memory, bar-per-row view. [`SeriesColumns`]
//! is the column-per-field layout written to the cache artifact.

use crate::index::{self, DayRun};

/// Candle colour derived from open and close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// `Up` when `close >= open`; a missing price never compares, so it is `Down`.
    pub fn from_prices(open: Option<f64>, close: Option<f64>) -> Self {
        match (open, close) {
            (Some(open), Some(close)) if close >= open => Direction::Up,
            _ => Direction::Down,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One time-stamped OHLC record. Prices that failed to parse are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: chrono::NaiveDateTime,
    pub date: chrono::NaiveDate,
    pub time: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub direction: Direction,
    pub tick_volume: Option<f64>,
    pub volume: Option<f64>,
    pub spread: Option<f64>,
}

/// Bars in source-file order plus the day-run index over them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub bars: Vec<Bar>,
    pub day_runs: Vec<DayRun>,
    /// Names of the columns carried by the artifact.
    pub columns: Vec<String>,
}

/// Externally visible shape of an imported bar.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ImportedBar {
    pub date: chrono::NaiveDate,
    pub time: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub direction: Direction,
    pub timestamp: chrono::NaiveDateTime,
}

/// Chart projection of a bar.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ClosePoint {
    pub timestamp: chrono::NaiveDateTime,
    pub close: Option<f64>,
}

impl NormalizedSeries {
    pub fn from_bars(bars: Vec<Bar>, columns: Vec<String>) -> Self {
        let mut runs = index::DayRunBuilder::default();
        for bar in &bars {
            runs.push(bar.date);
        }
        NormalizedSeries {
            bars,
            day_runs: runs.finish(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn project(&self) -> Vec<ImportedBar> {
        self.bars
            .iter()
            .map(|bar| ImportedBar {
                date: bar.date,
                time: bar.time.clone(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                direction: bar.direction,
                timestamp: bar.timestamp,
            })
            .collect()
    }

    /// Bars whose calendar date lies in `[start, end]`, in file order.
    pub fn bars_in_window(
        &self,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> impl Iterator<Item = &Bar> + '_ {
        self.day_runs
            .iter()
            .filter(move |run| run.date >= start && run.date <= end)
            .flat_map(move |run| {
                let from = run.start_index as usize;
                let to = (run.end_index as usize + 1).min(self.bars.len());
                self.bars.get(from..to).unwrap_or_default()
            })
    }
}

/// Structure-of-arrays layout of a [`NormalizedSeries`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SeriesColumns {
    pub timestamps: Vec<chrono::NaiveDateTime>,
    pub dates: Vec<chrono::NaiveDate>,
    pub times: Vec<String>,
    pub opens: Vec<Option<f64>>,
    pub highs: Vec<Option<f64>>,
    pub lows: Vec<Option<f64>>,
    pub closes: Vec<Option<f64>>,
    pub directions: Vec<Direction>,
    pub tick_volumes: Vec<Option<f64>>,
    pub volumes: Vec<Option<f64>>,
    pub spreads: Vec<Option<f64>>,
    pub day_runs: Vec<DayRun>,
    pub columns: Vec<String>,
}

impl SeriesColumns {
    pub fn from_series(series: &NormalizedSeries) -> Self {
        let n = series.len();
        let mut cols = SeriesColumns {
            timestamps: Vec::with_capacity(n),
            dates: Vec::with_capacity(n),
            times: Vec::with_capacity(n),
            opens: Vec::with_capacity(n),
            highs: Vec::with_capacity(n),
            lows: Vec::with_capacity(n),
            closes: Vec::with_capacity(n),
            directions: Vec::with_capacity(n),
            tick_volumes: Vec::with_capacity(n),
            volumes: Vec::with_capacity(n),
            spreads: Vec::with_capacity(n),
            day_runs: series.day_runs.clone(),
            columns: series.columns.clone(),
        };
        for bar in &series.bars {
            cols.timestamps.push(bar.timestamp);
            cols.dates.push(bar.date);
            cols.times.push(bar.time.clone());
            cols.opens.push(bar.open);
            cols.highs.push(bar.high);
            cols.lows.push(bar.low);
            cols.closes.push(bar.close);
            cols.directions.push(bar.direction);
            cols.tick_volumes.push(bar.tick_volume);
            cols.volumes.push(bar.volume);
            cols.spreads.push(bar.spread);
        }
        cols
    }

    /// Reassembles bars, rejecting columns of unequal length or a day-run
    /// index that does not tile the rows.
    pub fn into_series(self) -> std::result::Result<NormalizedSeries, String> {
        let n = self.timestamps.len();
        let lengths = [
            ("dates", self.dates.len()),
            ("times", self.times.len()),
            ("opens", self.opens.len()),
            ("highs", self.highs.len()),
            ("lows", self.lows.len()),
            ("closes", self.closes.len()),
            ("directions", self.directions.len()),
            ("tick_volumes", self.tick_volumes.len()),
            ("volumes", self.volumes.len()),
            ("spreads", self.spreads.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(format!("column `{name}` has {len} rows, expected {n}"));
        }
        if !index::runs_cover(&self.day_runs, n) {
            return Err("day-run index does not match row count".to_string());
        }

        let mut bars = Vec::with_capacity(n);
        let mut times = self.times.into_iter();
        for i in 0..n {
            bars.push(Bar {
                timestamp: self.timestamps[i],
                date: self.dates[i],
                time: times.next().unwrap_or_default(),
                open: self.opens[i],
                high: self.highs[i],
                low: self.lows[i],
                close: self.closes[i],
                direction: self.directions[i],
                tick_volume: self.tick_volumes[i],
                volume: self.volumes[i],
                spread: self.spreads[i],
            });
        }

        Ok(NormalizedSeries {
            bars,
            day_runs: self.day_runs,
            columns: self.columns,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) fn bar(day: u32, hour: u32, open: Option<f64>, close: Option<f64>) -> Bar {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        Bar {
            timestamp: date.and_hms_opt(hour, 0, 0).unwrap(),
            date,
            time: format!("{hour:02}:00:00"),
            open,
            high: open.zip(close).map(|(o, c)| o.max(c)),
            low: open.zip(close).map(|(o, c)| o.min(c)),
            close,
            direction: Direction::from_prices(open, close),
            tick_volume: None,
            volume: Some(10.0),
            spread: None,
        }
    }

    #[test]
    fn direction_uses_greater_or_equal() {
        assert_eq!(Direction::from_prices(Some(100.0), Some(101.0)), Direction::Up);
        assert_eq!(Direction::from_prices(Some(101.0), Some(100.0)), Direction::Down);
        assert_eq!(Direction::from_prices(Some(100.0), Some(100.0)), Direction::Up);
        assert_eq!(Direction::from_prices(None, Some(100.0)), Direction::Down);
        assert_eq!(Direction::from_prices(Some(100.0), None), Direction::Down);
    }

    #[test]
    fn columns_round_trip_preserves_order_and_missing_values() {
        let series = NormalizedSeries::from_bars(
            vec![
                bar(2, 10, Some(1.5), Some(1.4)),
                bar(1, 9, None, Some(1.0)),
                bar(1, 10, Some(1.0), Some(1.2)),
            ],
            vec!["open".into(), "close".into()],
        );
        let back = SeriesColumns::from_series(&series).into_series().unwrap();
        assert_eq!(back, series);
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let series = NormalizedSeries::from_bars(vec![bar(1, 9, Some(1.0), Some(2.0))], vec![]);
        let mut cols = SeriesColumns::from_series(&series);
        cols.closes.clear();
        let err = cols.into_series().unwrap_err();
        assert!(err.contains("closes"));
    }

    #[test]
    fn window_selects_inclusive_dates_in_file_order() {
        let series = NormalizedSeries::from_bars(
            vec![
                bar(3, 9, Some(1.0), Some(1.0)),
                bar(1, 9, Some(1.0), Some(1.0)),
                bar(2, 9, Some(1.0), Some(1.0)),
                bar(3, 10, Some(1.0), Some(1.0)),
                bar(4, 9, Some(1.0), Some(1.0)),
            ],
            vec![],
        );
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let picked: Vec<u32> = series
            .bars_in_window(d(2), d(3))
            .map(|b| chrono::Datelike::day(&b.date))
            .collect();
        assert_eq!(picked, [3, 2, 3]);
        assert_eq!(series.bars_in_window(d(10), d(12)).count(), 0);
    }
}
