use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Fetch cancelled: {0}")]
    Cancelled(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Crawler already started")]
    AlreadyStarted,

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Cancellation is a shutdown signal, not a per-URL failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
