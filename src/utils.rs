use crate::series;

/// Configures a custom Rayon thread pool with specified size.
///
/// # Arguments
/// * `num_threads` - Desired number of threads for the pool.
///
/// # Returns
/// * `Result<ThreadPool>` - Created thread pool or an error if creation fails.
pub fn configure_thread_pool(num_threads: usize) -> anyhow::Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build thread pool: {}", e))
}

/// Clamps a requested thread count to the available cores.
///
/// `None` means "use rayon's default". Zero is rejected.
pub fn effective_threads(requested: Option<usize>) -> anyhow::Result<usize> {
    match requested {
        Some(0) => Err(anyhow::anyhow!("Number of threads must be a positive integer")),
        Some(n) => {
            let max_threads = num_cpus::get();
            if n > max_threads {
                tracing::warn!(requested = n, max_threads, "limiting thread count to available cores");
                Ok(max_threads)
            } else {
                Ok(n)
            }
        }
        None => Ok(rayon::current_num_threads()),
    }
}

/// Replaces `path` with `data` via a temporary sibling and a rename, so
/// readers see either the old or the new content.
pub fn write_replace(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let result = std::fs::write(&tmp, data).and_then(|_| std::fs::rename(&tmp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Formats a bar timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(ts: &chrono::NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_price(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.5}", v))
}

/// Prints the first `count` bars of an imported series.
///
/// # Example Output
/// ```text
///  - ts: 2024-01-02 00:05:00, open: 1.10000, high: 1.10100, low: 1.09900, close: 1.10050, up
///  - ts: 2024-01-02 00:10:00, open: 1.10050, high: 1.10060, low: 1.09800, close: 1.09900, down
/// ```
pub fn print_bars(items: &[series::ImportedBar], count: usize) {
    for item in items.iter().take(count) {
        println!(
            " - ts: {}, open: {}, high: {}, low: {}, close: {}, {}",
            format_timestamp(&item.timestamp),
            format_price(item.open),
            format_price(item.high),
            format_price(item.low),
            format_price(item.close),
            item.direction,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_is_rejected() {
        assert!(effective_threads(Some(0)).is_err());
        assert_eq!(effective_threads(Some(1)).unwrap(), 1);
        assert!(effective_threads(Some(usize::MAX)).unwrap() <= num_cpus::get());
    }

    #[test]
    fn write_replace_overwrites_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_replace(&path, b"first, longer content").unwrap();
        write_replace(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("doc.json.tmp").exists());
    }

    #[test]
    fn missing_price_prints_as_dash() {
        assert_eq!(format_price(None), "-");
        assert_eq!(format_price(Some(1.5)), "1.50000");
    }
}
