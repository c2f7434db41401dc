#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ohlc_cache::cache::SeriesCache;
use ohlc_cache::config::AppConfig;
use tempfile::TempDir;

pub const HEADER: &str = "<DATE>\t<TIME>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\t<TICKVOL>\t<VOL>\t<SPREAD>";

pub struct Workspace {
    _dir: TempDir, // keep alive for the life of the test
    pub root: PathBuf,
    pub config: AppConfig,
    pub cache: SeriesCache,
}

pub fn workspace() -> Workspace {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().to_path_buf();
    let config = AppConfig::default().rooted_at(&root);
    let cache = SeriesCache::open(&config.cache_dir).expect("cache");
    Workspace {
        _dir: dir,
        root,
        config,
        cache,
    }
}

/// One row per `(date, time, open, close)`; high/low are derived.
pub fn write_csv(dir: &Path, name: &str, rows: &[(&str, &str, f64, f64)]) -> PathBuf {
    let mut text = String::from(HEADER);
    text.push('\n');
    for (date, time, open, close) in rows {
        text.push_str(&format!(
            "{date}\t{time}\t{open}\t{}\t{}\t{close}\t10\t0\t2\n",
            open.max(*close),
            open.min(*close),
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write csv");
    path
}

pub fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(y, m, d).expect("date")
}
