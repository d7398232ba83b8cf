use thiserror::Error;

/// Raised when a data source cannot be opened or introspected.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to connect to {target}: {message}")]
    Connection { target: String, message: String },

    #[error("Introspection failed: {0}")]
    Introspection(String),

    #[error("Unsupported source: {0}")]
    Unsupported(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document data: {0}")]
    Documents(String),
}

/// Failures of a single completion round-trip.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("AI not configured: {0}")]
    NotConfigured(String),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed API envelope: {0}")]
    Envelope(String),

    #[error("Response cache error: {0}")]
    Cache(String),
}

impl LlmError {
    /// Transport failures, throttling and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Nothing to draw: {0}")]
    Empty(&'static str),

    #[error("Failed to format SVG: {0}")]
    Format(#[from] std::fmt::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
