use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("No ChEMBL entry for '{0}'")]
    CompoundNotFound(String),

    #[error("Please enter a compound name.")]
    EmptyQuery,

    #[error("Unsupported export format: {0}")]
    Unsupported(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReportError {
    /// True for the one failure that is expected to abort a report.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReportError::CompoundNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
