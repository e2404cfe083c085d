use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QpError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Ill-specified problem: {0}")]
    IllSpecifiedProblem(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Solver error: {0}")]
    SolverError(String),
}

impl QpError {
    /// Shorthand used by the setters: `"<what>: expected <expected>, got <actual>"`
    pub fn dimension(what: &str, expected: usize, actual: usize) -> Self {
        QpError::DimensionMismatch(format!("{}: expected {}, got {}", what, expected, actual))
    }
}

impl From<serde_json::Error> for QpError {
    fn from(err: serde_json::Error) -> Self {
        QpError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QpError>;
