use std::path::PathBuf;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::cache::CacheKey;
use crate::error::{Error, Result};
use crate::file_name;
use crate::importer::{ImportPipeline, ImportedSeries};
use crate::metadata::MetadataIndex;

/// Per-file results of a batch import, in input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub imported: Vec<(PathBuf, ImportedSeries)>,
    pub failed: Vec<(PathBuf, Error)>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Imports many files and records each success in the metadata index.
///
/// Files are grouped by cache key; groups run in parallel on the current
/// rayon pool while files inside a group run in input order, so each cache
/// entry has a single writer. Index updates happen afterwards on the calling
/// thread, in input order.
///
/// # Arguments
/// * `pipeline` - Pipeline used for every file.
/// * `index` - Metadata index updated after each successful import.
/// * `files` - Input paths; one failure never stops the others.
///
/// # Returns
/// * `BatchOutcome` - Successes and failures, each in input order.
pub fn import_files(
    pipeline: &ImportPipeline<'_>,
    index: &mut MetadataIndex,
    files: &[PathBuf],
) -> BatchOutcome {
    let bar = indicatif::ProgressBar::new(files.len() as u64);
    bar.set_style(
        indicatif::ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
    );

    let results: Vec<(usize, Result<ImportedSeries>)> = group_by_key(files)
        .into_values()
        .collect::<Vec<_>>()
        .par_iter()
        .flat_map_iter(|members| {
            members
                .iter()
                .map(|&i| {
                    let result = pipeline.import(&files[i]);
                    bar.inc(1);
                    (i, result)
                })
                .collect::<Vec<_>>()
        })
        .collect();
    bar.finish_with_message("done");

    let mut ordered: Vec<Option<Result<ImportedSeries>>> = (0..files.len()).map(|_| None).collect();
    for (i, result) in results {
        ordered[i] = Some(result);
    }

    let mut outcome = BatchOutcome::default();
    for (path, result) in files.iter().zip(ordered) {
        let Some(result) = result else { continue };
        match result.and_then(|imported| imported.record(index, path).map(|_| imported)) {
            Ok(imported) => outcome.imported.push((path.clone(), imported)),
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "import failed");
                outcome.failed.push((path.clone(), e));
            }
        }
    }
    outcome
}

/// Files that share a cache key end up in the same group; names that do not
/// parse each get a group of their own.
fn group_by_key(files: &[PathBuf]) -> IndexMap<(Option<CacheKey>, usize), Vec<usize>> {
    let mut groups: IndexMap<(Option<CacheKey>, usize), Vec<usize>> = IndexMap::new();
    for (i, path) in files.iter().enumerate() {
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| file_name::parse(n).ok())
            .map(|span| CacheKey::new(span.symbol, span.interval));
        let group = match key {
            Some(key) => (Some(key), 0),
            None => (None, i),
        };
        groups.entry(group).or_default().push(i);
    }
    groups
}
