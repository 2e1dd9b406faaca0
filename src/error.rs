use thiserror::Error;

/// Errors surfaced by the library core.
///
/// Per-entry scan failures never show up here - the scanner swallows them
/// and adjusts the progress totals instead, so one malformed archive can
/// never abort a batch.
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown category label: {0}")]
    UnknownCategory(String),

    #[error("a background task is already running")]
    TaskBusy,
}

pub type Result<T> = std::result::Result<T, ShelfError>;
