//! Import fixed-format OHLC CSV files, cache them as columnar binary
//! artifacts, keep an index of what has been imported, and assemble
//! multi-interval close charts over a date window.

pub mod cache;
pub mod chart;
pub mod cli;
pub mod colors;
pub mod config;
pub mod csv_processor;
pub mod error;
pub mod file_name;
pub mod importer;
pub mod index;
pub mod metadata;
pub mod plot_registry;
pub mod progress;
pub mod series;
pub mod utils;

pub use error::{Error, Result};
