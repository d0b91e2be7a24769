use thiserror::Error;

use crate::geometry::Point3;

/// Errors raised by the routing core.
///
/// `DataUnavailable` and `NoCandidateFound` are sparse-data conditions the
/// planner routes around by shrinking its grid; they only reach callers of the
/// individual stages. `DegenerateGeometry` and `NotFound` indicate malformed
/// input and are returned from the planner immediately.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("point store data unavailable: {0}")]
    DataUnavailable(String),
    #[error("no candidate system within {radius:.1} ly of {center:?}")]
    NoCandidateFound { center: Point3, radius: f64 },
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("system not found: {0}")]
    NotFound(String),
}

/// Errors raised by point store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no system matches {0}")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Maps a failed spatial query onto the planner's taxonomy.
    pub fn into_unavailable(self) -> RouteError {
        RouteError::DataUnavailable(self.to_string())
    }
}

impl From<StoreError> for RouteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => RouteError::NotFound(what),
            other => RouteError::DataUnavailable(other.to_string()),
        }
    }
}
