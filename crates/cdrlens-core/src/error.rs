use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CdrError {
    #[error("malformed input on line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    #[error("no bearer token supplied for remote fetch")]
    MissingCredential,

    #[error("remote credential rejected: {0}")]
    AuthenticationRejected(String),

    #[error("rate limited by report service. Wait and try again")]
    RateLimited,

    #[error("report generation timed out after {waited_secs}s")]
    ReportTimeout { waited_secs: u64 },

    #[error("report generation failed: {0}")]
    ReportFailed(String),

    #[error("report request failed: {0}")]
    Fetch(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("failed to load config from {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("SQLite error: {0}")]
    Storage(rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for CdrError {
    /// Locking, open and I/O failures mean the database cannot be reached;
    /// everything else is a query-level error.
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match err.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
                | ErrorCode::NotADatabase,
            ) => CdrError::StorageUnavailable(err.to_string()),
            _ => CdrError::Storage(err),
        }
    }
}
