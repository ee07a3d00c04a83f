use foundation::Crs;
use formats::LoadError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CleanError {
    /// Only reachable for hand-built tables; the loader rejects such files.
    #[error("raw table has no '{0}' column")]
    MissingColumn(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpatialJoinError {
    #[error("CRS mismatch: occurrences are {occurrences}, boundaries are {boundaries}")]
    CrsMismatch { occurrences: Crs, boundaries: Crs },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Clean(#[from] CleanError),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown spatial predicate '{0}' (expected 'within' or 'intersects')")]
pub struct UnknownPredicate(pub String);
