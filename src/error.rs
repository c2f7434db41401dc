use std::path::PathBuf;

/// Unified error type for the import, cache and metadata pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File name does not follow `<SYMBOL>_<INTERVAL>_<START>_<END>.csv`.
    #[error("invalid file name format `{file_name}`: {reason}")]
    Format { file_name: String, reason: String },

    /// Configuration value that cannot be used (delimiter, date format, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// A mandatory column name is absent from the configured column list.
    #[error("configured columns do not contain `{0}`")]
    MissingColumn(String),

    /// A row whose date/time cell cannot be turned into a timestamp.
    #[error("row {line}: {reason}")]
    InvalidRow { line: u64, reason: String },

    /// A cache artifact or descriptor exists but cannot be read back.
    #[error("cache entry `{}` is corrupt: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    /// The metadata index could not be written to its backing store.
    #[error("failed to persist metadata index to `{}`", path.display())]
    IndexPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error")]
    Csv(#[from] csv::Error),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error")]
    Encode(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::CacheCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
