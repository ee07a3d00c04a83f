use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a source file into a table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed delimited data in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed parquet data in {}: {source}", path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{} is missing required columns: {}", path.display(), columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("expected GeoJSON FeatureCollection")]
    NotAFeatureCollection,

    #[error("invalid feature at index {index}: {reason}")]
    InvalidFeature { index: usize, reason: String },

    #[error("unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),
}
