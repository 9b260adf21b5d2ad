//! Error taxonomy for the request pipeline

use thiserror::Error;

/// Failures below the HTTP layer. No response exists when one of these occurs.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Short form for the status bar
    pub fn status_line(&self) -> String {
        match self {
            TransportError::Timeout => "Error: Request timed out".to_string(),
            TransportError::Connection(_) => "Error: Connection failed".to_string(),
            TransportError::Other(message) => format!("Error: {}", message),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Everything an operation can fail with
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OperationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("API request failed.\nStatus: {status} {reason}\n\n{excerpt}")]
    Status {
        status: u16,
        reason: String,
        excerpt: String,
    },

    #[error("Could not parse response:\n{0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("Could not save report: {0}")]
    Io(String),
}

impl OperationError {
    pub fn title(&self) -> &'static str {
        match self {
            OperationError::Transport(TransportError::Timeout) => "Timeout Error",
            OperationError::Transport(TransportError::Connection(_)) => "Connection Error",
            OperationError::Transport(TransportError::Other(_)) => "Error",
            OperationError::Status { .. } => "API Error",
            OperationError::Parse(_) => "Parse Error",
            OperationError::Validation(_) => "Input Required",
            OperationError::Io(_) => "Save Error",
        }
    }
}

/// Template lookup failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("Report template '{0}' is not registered")]
    NotFound(String),
}

impl From<TemplateError> for OperationError {
    fn from(err: TemplateError) -> Self {
        OperationError::Validation(err.to_string())
    }
}

/// Grid population and sorting failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GridError {
    #[error("row {row} has {found} cells, expected {expected}")]
    ArityMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}
