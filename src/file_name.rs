//! File-name grammar for imported price-history files.
//!
//! Accepted names look like `EURUSD_M5_202401010000_202401020000.csv`:
//! a symbol made of word characters (underscores allowed), an interval
//! `M<digits>`, and two 12-digit `yyyymmddHHMM` stamps. Anything else is a
//! [`Error::Format`].

use crate::error::{Error, Result};

const STAMP_FORMAT: &str = "%Y%m%d%H%M";
const STAMP_LEN: usize = 12;

/// Sampling period label such as `M5` or `M15`.
///
/// Ordering follows the numeric minute count, so `M5 < M15 < M60`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    label: String,
    minutes: u64,
}

impl Interval {
    pub fn as_str(&self) -> &str {
        &self.label
    }

    /// Numeric suffix after the leading `M`, used wherever intervals are sorted.
    pub fn sort_key(&self) -> u64 {
        self.minutes
    }
}

impl std::str::FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix('M').ok_or_else(|| Error::Format {
            file_name: s.to_string(),
            reason: "interval must start with `M`".to_string(),
        })?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Format {
                file_name: s.to_string(),
                reason: "interval must be `M` followed by digits".to_string(),
            });
        }
        let minutes = digits.parse::<u64>().map_err(|e| Error::Format {
            file_name: s.to_string(),
            reason: format!("interval out of range: {e}"),
        })?;
        Ok(Interval {
            label: s.to_string(),
            minutes,
        })
    }
}

impl TryFrom<String> for Interval {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.label
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes
            .cmp(&other.minutes)
            .then_with(|| self.label.cmp(&other.label))
    }
}

/// Identifying fields recovered from a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpan {
    pub symbol: String,
    pub interval: Interval,
    pub start: chrono::NaiveDateTime,
    pub end: chrono::NaiveDateTime,
}

impl FileSpan {
    /// Rebuilds the canonical file name for these fields.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.csv",
            self.symbol,
            self.interval,
            self.start.format(STAMP_FORMAT),
            self.end.format(STAMP_FORMAT),
        )
    }
}

/// Parses `<SYMBOL>_<INTERVAL>_<START>_<END>.csv`.
///
/// The symbol may itself contain underscores; the last three `_`-separated
/// fields are always interval, start and end.
///
/// # Example
/// ```
/// let span = ohlc_cache::file_name::parse("EURUSD_M5_202401010000_202401020000.csv").unwrap();
/// assert_eq!(span.symbol, "EURUSD");
/// assert_eq!(span.interval.as_str(), "M5");
/// ```
///
/// # Errors
/// * [`Error::Format`] when any part of the name does not match.
pub fn parse(file_name: &str) -> Result<FileSpan> {
    let format_error = |reason: &str| Error::Format {
        file_name: file_name.to_string(),
        reason: reason.to_string(),
    };

    let stem = file_name
        .strip_suffix(".csv")
        .ok_or_else(|| format_error("expected `.csv` extension"))?;

    let mut parts = stem.rsplitn(4, '_');
    let (Some(end), Some(start), Some(interval), Some(symbol)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format_error(
            "expected <SYMBOL>_<INTERVAL>_<START>_<END>.csv",
        ));
    };

    if symbol.is_empty() || !symbol.chars().all(is_word_char) {
        return Err(format_error("symbol must be one or more word characters"));
    }

    let interval: Interval = interval
        .parse()
        .map_err(|_| format_error("interval must match M<digits>"))?;

    Ok(FileSpan {
        symbol: symbol.to_string(),
        interval,
        start: parse_stamp(start).ok_or_else(|| format_error("invalid start stamp"))?,
        end: parse_stamp(end).ok_or_else(|| format_error("invalid end stamp"))?,
    })
}

/// Numeric ordering key of an interval label, `None` when it is not `M<digits>`.
pub fn interval_sort_key(label: &str) -> Option<u64> {
    label.parse::<Interval>().ok().map(|i| i.sort_key())
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn parse_stamp(s: &str) -> Option<chrono::NaiveDateTime> {
    if s.len() != STAMP_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    chrono::NaiveDateTime::parse_from_str(s, STAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn parses_well_formed_name() {
        let span = parse("EURUSD_M5_202401010000_202401021530.csv").unwrap();
        assert_eq!(span.symbol, "EURUSD");
        assert_eq!(span.interval.as_str(), "M5");
        assert_eq!(span.start, dt(2024, 1, 1, 0, 0));
        assert_eq!(span.end, dt(2024, 1, 2, 15, 30));
    }

    #[test]
    fn symbol_may_contain_underscores() {
        let span = parse("EUR_USD_M15_202401010000_202401020000.csv").unwrap();
        assert_eq!(span.symbol, "EUR_USD");
        assert_eq!(span.interval.as_str(), "M15");
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "EURUSD_M5_202401010000_202401020000.txt",
            "EURUSD_M5_202401010000_202401020000.csvx",
            "EURUSD_H1_202401010000_202401020000.csv",
            "EURUSD_M_202401010000_202401020000.csv",
            "EURUSD_M5_20240101000_202401020000.csv",
            "EURUSD_M5_202413010000_202401020000.csv",
            "_M5_202401010000_202401020000.csv",
            "EUR-USD_M5_202401010000_202401020000.csv",
            "M5_202401010000_202401020000.csv",
            "",
        ] {
            let err = parse(name).unwrap_err();
            assert!(matches!(err, Error::Format { .. }), "{name} -> {err}");
        }
    }

    #[test]
    fn intervals_sort_numerically() {
        let mut intervals: Vec<Interval> = ["M60", "M5", "M15"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        intervals.sort();
        let labels: Vec<&str> = intervals.iter().map(Interval::as_str).collect();
        assert_eq!(labels, ["M5", "M15", "M60"]);
    }

    #[test]
    fn interval_serializes_as_label() {
        let interval: Interval = "M30".parse().unwrap();
        assert_eq!(serde_json::to_string(&interval).unwrap(), "\"M30\"");
        let back: Interval = serde_json::from_str("\"M30\"").unwrap();
        assert_eq!(back, interval);
        assert!(serde_json::from_str::<Interval>("\"D1\"").is_err());
    }

    proptest! {
        #[test]
        fn sort_key_is_numeric_suffix(n in 0u64..1_000_000) {
            prop_assert_eq!(interval_sort_key(&format!("M{n}")), Some(n));
        }

        #[test]
        fn file_name_round_trips(
            symbol in "[A-Za-z0-9][A-Za-z0-9_]{0,10}",
            minutes in 1u64..1440,
            start_day in 0i64..3000,
            len_minutes in 0i64..100_000,
        ) {
            let base = dt(2015, 1, 1, 0, 0);
            let start = base + chrono::Duration::minutes(start_day * 1440 + 7);
            let end = start + chrono::Duration::minutes(len_minutes);
            let name = format!(
                "{symbol}_M{minutes}_{}_{}.csv",
                start.format("%Y%m%d%H%M"),
                end.format("%Y%m%d%H%M"),
            );

            let span = parse(&name).unwrap();
            prop_assert_eq!(&span.symbol, &symbol);
            prop_assert_eq!(span.interval.sort_key(), minutes);
            prop_assert_eq!(span.start, start);
            prop_assert_eq!(span.end, end);
            prop_assert_eq!(span.file_name(), name.clone());
            prop_assert_eq!(parse(&span.file_name()).unwrap(), span);
        }
    }
}
