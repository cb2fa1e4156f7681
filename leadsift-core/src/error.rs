use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadError {
    #[error("Scan error: {0}")]
    Scan(#[from] leadsift_scanner::ScanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("External extraction error: {0}")]
    External(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task panicked: {0}")]
    Panic(String),
}

pub type Result<T> = std::result::Result<T, LeadError>;
