use thiserror::Error;

/// Main error type for the Hive system
#[derive(Error, Debug)]
pub enum HvError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Communication error: {0}")]
    Comm(#[from] CommError),

    #[error("Evaluation error: {0}")]
    Eval(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),
}

/// Arity and schema violations. These indicate a caller contract violation
/// and are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("expected point of length {expected}, got {actual}")]
    PointArity { expected: usize, actual: usize },

    #[error("expected objective to be a scalar or vector of length {expected}, got length {actual}")]
    ObjectiveArity { expected: usize, actual: usize },

    #[error("expected {expected} info values per record, got {actual}")]
    InfoArity { expected: usize, actual: usize },

    #[error("info column '{key}' has length {actual}, expected {expected}")]
    ColumnLength {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("info keys {actual:?} do not match history schema {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("requested window of {requested} records but history holds {len}")]
    Window { requested: usize, len: usize },
}

/// Delivery failures on the communicator. The transport beneath the
/// communicator is assumed reliable, so these are unrecoverable for the
/// affected rank.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("channel from rank {from} to rank {to} is disconnected")]
    Disconnected { from: usize, to: usize },

    #[error("collective receive from rank {from} failed: peer disconnected")]
    CollectiveDisconnected { from: usize },
}

/// Result type alias for Hive operations
pub type HvResult<T> = Result<T, HvError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HvError::Config(format!($($arg)*))
    };
}
