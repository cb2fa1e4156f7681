use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not an HTML page ({content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("Fetch of {url} failed after retries: {cause}")]
    Fetch { url: String, cause: String },

    #[error("Browser fetch failed: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    /// Faults a retry cannot change. Every HTTP status is retried.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ScanError::InvalidUrl(_) | ScanError::NotHtml { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ScanError::Status { status: 429, .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
