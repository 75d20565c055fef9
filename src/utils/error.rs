use thiserror::Error;
use tracing::{error, warn};

/// Matrixon relations engine error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed pagination token: {0}")]
    MalformedToken(&'static str),

    #[error("Unknown parent event: {0}")]
    UnknownParentEvent(String),

    #[error("Invalid pagination bounds: {0}")]
    InvalidPaginationBounds(&'static str),

    #[error("Event store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    BadDatabase(&'static str),

    #[error("Configuration error: {0}")]
    BadConfig(String),
}

/// Matrixon relations engine result type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn bad_database(message: &'static str) -> Self {
        warn!("Bad database: {}", message);
        Self::BadDatabase(message)
    }

    pub fn bad_config(message: &str) -> Self {
        error!("Bad config: {}", message);
        Self::BadConfig(message.to_owned())
    }

    /// Whether the caller, not the server, is at fault.
    ///
    /// Client errors map to a 4xx status at the API boundary, everything else
    /// to a 5xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::UnknownParentEvent(_)
                | Self::InvalidPaginationBounds(_)
        )
    }
}
