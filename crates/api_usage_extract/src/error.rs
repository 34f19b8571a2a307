//! Fatal errors of an extraction run, one variant per stage.

use event_log_client::EventLogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("setup failed: {0}")]
    Setup(#[source] EventLogError),

    #[error("authentication failed: {0}")]
    Auth(#[source] EventLogError),

    #[error("query failed: {0}")]
    Query(#[source] EventLogError),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type alias for extraction stages.
pub type ExtractResult<T> = Result<T, ExtractError>;
