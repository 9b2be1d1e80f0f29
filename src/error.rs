use std::fmt;

/// Per-query failure taxonomy.
///
/// Every variant is scoped to a single query of a batch: the orchestrator turns
/// it into that query's entry of the batch result and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The SQL text yields no usable statement
    #[error("malformed query: {0}")]
    MalformedQuery(#[from] SplitError),

    /// A non-final statement failed
    #[error("setup statement {index} failed: {cause}")]
    SetupError {
        index: usize,
        #[source]
        cause: rusqlite::Error,
    },

    /// The result-producing statement failed
    #[error("execution failed: {0}")]
    ExecutionError(#[source] rusqlite::Error),

    /// Column metadata could not be read after a successful execution
    #[error("column metadata unavailable: {0}")]
    MetadataError(String),

    /// A row value could not be scanned into its column's kind
    #[error("{}", ScanDisplay(.row_index, .cause))]
    ScanError {
        row_index: Option<usize>,
        #[source]
        cause: rusqlite::Error,
    },

    /// No connection could be borrowed from the pool
    #[error("connection error: {0}")]
    ConnectionError(#[from] PoolError),

    /// The batch was cancelled before the query completed
    #[error("query cancelled")]
    Cancelled,

    /// The worker running the query died
    #[error("internal error: {0}")]
    Internal(String),
}

struct ScanDisplay<'a>(&'a Option<usize>, &'a rusqlite::Error);

impl fmt::Display for ScanDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(row) => write!(f, "scan failed at row {}: {}", row, self.1),
            None => write!(f, "scan failed: {}", self.1),
        }
    }
}

impl QueryError {
    /// Stable name of the error category, used in serialized batch results
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::MalformedQuery(_) => "MalformedQuery",
            QueryError::SetupError { .. } => "SetupError",
            QueryError::ExecutionError(_) => "ExecutionError",
            QueryError::MetadataError(_) => "MetadataError",
            QueryError::ScanError { .. } => "ScanError",
            QueryError::ConnectionError(_) => "ConnectionError",
            QueryError::Cancelled => "Cancelled",
            QueryError::Internal(_) => "Internal",
        }
    }

    /// Whether the underlying SQLite call was stopped by `sqlite3_interrupt`
    pub(crate) fn is_interrupt(&self) -> bool {
        let cause = match self {
            QueryError::SetupError { cause, .. } => cause,
            QueryError::ExecutionError(cause) => cause,
            QueryError::ScanError { cause, .. } => cause,
            _ => return false,
        };
        matches!(
            cause,
            rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::OperationInterrupted
        )
    }
}

/// Raised when a SQL text contains nothing but separators and whitespace
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("query contains no statements")]
    EmptyQuery,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to open connection to {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to configure connection: {0}")]
    Configure(#[source] rusqlite::Error),

    #[error("connection pool is closed")]
    Closed,

    #[error("connection acquisition cancelled")]
    Cancelled,
}

/// Misuse of the frame builder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("columns already set")]
    ColumnsAlreadySet,

    #[error("columns not set before first row")]
    ColumnsNotSet,

    #[error("row has {actual} cells, frame has {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    #[error("cell {index} does not match column kind {expected}")]
    CellKind { index: usize, expected: crate::types::SemanticKind },
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
}
