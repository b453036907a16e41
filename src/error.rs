use thiserror::Error;

/// Result type for pgwake operations
pub type Result<T> = std::result::Result<T, PgwakeError>;

/// Error type returned by message handlers.
///
/// Handlers are caller-supplied and may fail for any reason, so the listen
/// loop accepts any boxed error and carries it through [`PgwakeError::Handler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for pgwake operations
#[derive(Error, Debug)]
pub enum PgwakeError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Message handler failed: {0}")]
    Handler(#[source] HandlerError),
}
