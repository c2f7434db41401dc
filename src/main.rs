use anyhow::Context;

use ohlc_cache::cache::{CacheKey, SeriesCache};
use ohlc_cache::chart::{ChartAssembler, ChartRequest, DateWindow, SeriesSelection};
use ohlc_cache::cli::{self, Command};
use ohlc_cache::colors::ColorSchemes;
use ohlc_cache::config::AppConfig;
use ohlc_cache::file_name::Interval;
use ohlc_cache::importer::{CacheOutcome, ImportPipeline};
use ohlc_cache::metadata::MetadataIndex;
use ohlc_cache::plot_registry::{self, PlotRegistry};
use ohlc_cache::{progress, utils};

/// Main entry point of the application.
///
/// Parses arguments, installs logging, loads the one configuration instance
/// and dispatches to the selected subcommand.
fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    let config = AppConfig::load_or_init(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    match args.command {
        Command::Import { files, threads } => run_import(&config, &files, threads),
        Command::Chart {
            intervals,
            symbol,
            start,
            end,
        } => run_chart(&config, &intervals, symbol, start, end),
        Command::Index => {
            let index = MetadataIndex::load(&config.metadata_path)?;
            println!("{}", serde_json::to_string_pretty(index.document())?);
            Ok(())
        }
        Command::Show {
            symbol,
            interval,
            rows,
        } => run_show(&config, &symbol, &interval, rows),
        Command::Plots => run_plots(&config),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_import(
    config: &AppConfig,
    files: &[std::path::PathBuf],
    threads: Option<usize>,
) -> anyhow::Result<()> {
    let total_start = std::time::Instant::now();
    let cache = SeriesCache::open(&config.cache_dir)
        .with_context(|| format!("Failed to open cache {}", config.cache_dir.display()))?;
    let mut index = MetadataIndex::load(&config.metadata_path)?;
    let pipeline = ImportPipeline::new(config, &cache);

    let effective_threads = utils::effective_threads(threads)?;
    tracing::info!(threads = effective_threads, files = files.len(), "starting import");

    let outcome = if threads.is_some() {
        let local_pool = utils::configure_thread_pool(effective_threads)?;
        local_pool.install(|| progress::import_files(&pipeline, &mut index, files))
    } else {
        progress::import_files(&pipeline, &mut index, files)
    };

    for (_, imported) in &outcome.imported {
        let source = match imported.outcome {
            CacheOutcome::Hit => "cache",
            CacheOutcome::Miss => "csv",
        };
        println!(
            "✅ {}: {} bars from {} ({} .. {})",
            imported.key(),
            imported.bars.len(),
            source,
            utils::format_timestamp(&imported.start),
            utils::format_timestamp(&imported.end),
        );
    }
    for (path, error) in &outcome.failed {
        println!("❌ {}: {}", path.display(), error_chain(error));
    }
    println!(
        "{} of {} file(s) imported in {:?} seconds",
        outcome.imported.len(),
        files.len(),
        total_start.elapsed().as_secs_f64()
    );

    if !outcome.all_succeeded() {
        anyhow::bail!("{} file(s) failed to import", outcome.failed.len());
    }
    Ok(())
}

/// Renders an error with its sources for the summary line.
fn error_chain(error: &ohlc_cache::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn run_chart(
    config: &AppConfig,
    intervals: &[String],
    symbol: Option<String>,
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
) -> anyhow::Result<()> {
    let index = MetadataIndex::load(&config.metadata_path)?;
    let symbol = match symbol {
        Some(symbol) => symbol,
        None => index
            .symbols()
            .next()
            .map(str::to_string)
            .context("No symbols imported yet; run `import` first")?,
    };
    let range = index.date_range();
    let window = DateWindow::new(
        start.or(range.start).context("No start date given and index is empty")?,
        end.or(range.end).context("No end date given and index is empty")?,
    );

    let intervals: Vec<Interval> = if intervals.is_empty() {
        index.available_intervals().to_vec()
    } else {
        intervals
            .iter()
            .map(|label| label.parse())
            .collect::<ohlc_cache::Result<_>>()?
    };
    let schemes = ColorSchemes::load(&config.color_schemes_path)?;
    let selections: Vec<SeriesSelection> = intervals
        .into_iter()
        .map(|interval| {
            let color = schemes.color_for(&config.color_scheme, &interval).to_string();
            SeriesSelection { interval, color }
        })
        .collect();

    let request = ChartRequest::new(symbol, selections, window)?;
    let cache = SeriesCache::open(&config.cache_dir)?;
    let assembly = ChartAssembler::new(&cache).assemble_request(&request)?;

    for missing in &assembly.missing {
        println!("⚠️ File {} not found, series skipped", missing.path.display());
    }
    if assembly.series.is_empty() {
        println!("Nothing to plot for {}", request.symbol);
        return Ok(());
    }

    let title = plot_registry::chart_title(assembly.series.iter().map(|s| &s.interval));
    let hash = plot_registry::chart_hash(&request.symbol, &title, &request.window);
    let path = plot_registry::export_chart_data(&config.plot_dir, &hash, &assembly)?;
    let mut registry = PlotRegistry::load(&config.metaplot_path)?;
    registry.record(&hash, &request.symbol, &title, &request.window)?;

    for series in &assembly.series {
        println!("📈 {} {}: {} points", series.interval, series.color, series.points.len());
    }
    println!(
        "✅ Chart {} {} ({}) saved to {}",
        request.symbol,
        title,
        hash,
        path.display()
    );
    Ok(())
}

fn run_show(config: &AppConfig, symbol: &str, interval: &str, rows: usize) -> anyhow::Result<()> {
    let cache = SeriesCache::open(&config.cache_dir)?;
    let interval: Interval = interval.parse()?;
    let key = CacheKey::new(symbol, interval.clone());
    if !cache.has(&key) {
        let available: Vec<String> = cache.keys()?.iter().map(CacheKey::name).collect();
        anyhow::bail!(
            "No cached series for {} (cached: {})",
            key,
            if available.is_empty() { "none".to_string() } else { available.join(", ") }
        );
    }
    let index = MetadataIndex::load(&config.metadata_path)?;
    let descriptor = cache.descriptor(&key)?;
    let series = cache.load(&key)?;
    println!(
        "📄 {} from {}",
        descriptor.filename,
        index.file_for(symbol, &interval).unwrap_or("(not indexed)"),
    );
    println!(
        "📄 {} rows, {} .. {}, columns: {}",
        descriptor.stats.rows,
        utils::format_timestamp(&descriptor.start_datetime),
        utils::format_timestamp(&descriptor.end_datetime),
        descriptor.stats.columns.join(", "),
    );
    utils::print_bars(&series.project(), rows);
    Ok(())
}

fn run_plots(config: &AppConfig) -> anyhow::Result<()> {
    let registry = PlotRegistry::load(&config.metaplot_path)?;
    for (hash, entry) in registry.entries() {
        println!(
            "{} {} {} {} .. {} (created {})",
            hash,
            entry.symbol,
            entry.title,
            entry.start_date,
            entry.end_date,
            utils::format_timestamp(&entry.created_at),
        );
    }
    for path in PlotRegistry::list_plots(&config.plot_dir)? {
        println!(" - {}", path.display());
    }
    Ok(())
}
