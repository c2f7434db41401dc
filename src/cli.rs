use std::path::PathBuf;

use crate::config;

/// Subcommand selected on the command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Import {
        files: Vec<PathBuf>,
        threads: Option<usize>,
    },
    Chart {
        intervals: Vec<String>,
        symbol: Option<String>,
        start: Option<chrono::NaiveDate>,
        end: Option<chrono::NaiveDate>,
    },
    Index,
    Show {
        symbol: String,
        interval: String,
        rows: usize,
    },
    Plots,
}

/// Structure representing command-line arguments.
#[derive(Debug)]
pub struct Args {
    pub config: PathBuf,
    pub verbose: bool,
    pub command: Command,
}

impl Args {
    /// Parses command-line arguments using `clap`.
    ///
    /// # Errors
    /// * Exits with a usage message if required arguments are missing or invalid.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        let command = match matches.subcommand() {
            Some(("import", sub)) => Command::Import {
                files: sub
                    .get_many::<PathBuf>("files")
                    .map(|files| files.cloned().collect())
                    .unwrap_or_default(),
                threads: sub.get_one::<usize>("threads").copied(),
            },
            Some(("chart", sub)) => Command::Chart {
                intervals: sub
                    .get_many::<String>("interval")
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default(),
                symbol: sub.get_one::<String>("symbol").cloned(),
                start: sub.get_one::<chrono::NaiveDate>("start").copied(),
                end: sub.get_one::<chrono::NaiveDate>("end").copied(),
            },
            Some(("show", sub)) => Command::Show {
                symbol: sub.get_one::<String>("symbol").cloned().unwrap_or_default(),
                interval: sub.get_one::<String>("interval").cloned().unwrap_or_default(),
                rows: sub.get_one::<usize>("rows").copied().unwrap_or(5),
            },
            Some(("plots", _)) => Command::Plots,
            _ => Command::Index,
        };

        Args {
            config: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH)),
            verbose: matches.get_flag("verbose"),
            command,
        }
    }
}

fn command() -> clap::Command {
    clap::Command::new("ohlc-cache")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Import OHLC price-history CSV files into a binary cache and assemble chart data")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to the JSON configuration file")
                .global(true)
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            clap::Command::new("import")
                .about("Import CSV files named <SYMBOL>_<INTERVAL>_<START>_<END>.csv")
                .arg(
                    clap::Arg::new("files")
                        .help("CSV files to import")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    clap::Arg::new("threads")
                        .short('t')
                        .long("threads")
                        .help("Number of threads to use (default: all available)")
                        .num_args(1)
                        .value_parser(clap::builder::ValueParser::new(parse_usize_positive)),
                ),
        )
        .subcommand(
            clap::Command::new("chart")
                .about("Assemble a multi-interval close chart over a date window")
                .arg(
                    clap::Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .help("Interval to include, e.g. M5 (repeatable; default: all indexed)")
                        .action(clap::ArgAction::Append)
                        .num_args(1),
                )
                .arg(
                    clap::Arg::new("symbol")
                        .short('s')
                        .long("symbol")
                        .help("Symbol to chart (default: first indexed symbol)")
                        .num_args(1),
                )
                .arg(
                    clap::Arg::new("start")
                        .long("start")
                        .help("First calendar date, YYYY-MM-DD (default: index range start)")
                        .num_args(1)
                        .value_parser(clap::builder::ValueParser::new(parse_date)),
                )
                .arg(
                    clap::Arg::new("end")
                        .long("end")
                        .help("Last calendar date, YYYY-MM-DD (default: index range end)")
                        .num_args(1)
                        .value_parser(clap::builder::ValueParser::new(parse_date)),
                ),
        )
        .subcommand(clap::Command::new("index").about("Print the metadata index"))
        .subcommand(
            clap::Command::new("show")
                .about("Print the first cached bars of a series")
                .arg(clap::Arg::new("symbol").required(true).num_args(1))
                .arg(clap::Arg::new("interval").required(true).num_args(1))
                .arg(
                    clap::Arg::new("rows")
                        .short('n')
                        .long("rows")
                        .help("Number of bars to print")
                        .num_args(1)
                        .value_parser(clap::builder::ValueParser::new(parse_usize_positive)),
                ),
        )
        .subcommand(clap::Command::new("plots").about("List recorded charts"))
}

/// Validates that a count is a positive integer.
fn parse_usize_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("Must be a positive integer".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("Not a valid number: {}", e)),
    }
}

fn parse_date(s: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Expected YYYY-MM-DD: {}", e))
}
