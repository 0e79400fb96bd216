use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvoicingError {
    #[error("no source files match '{pattern}' in {}", .dir.display())]
    SourceNotFound { dir: PathBuf, pattern: String },
    #[error("schema mismatch in {origin}: {detail}")]
    SchemaMismatch { origin: String, detail: String },
    #[error("no records created in {month:02}/{year} across the prior, current and next month sources")]
    NoDataForMonth { month: u32, year: i32 },
    #[error("failed to write report {}: {detail}", .path.display())]
    OutputWriteFailure { path: PathBuf, detail: String },
    #[error("invalid reporting period: {0}")]
    InvalidPeriod(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InvoicingError {
    pub(crate) fn schema(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            origin: origin.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn write_failure(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        Self::OutputWriteFailure {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub fn is_source_not_found(&self) -> bool {
        matches!(self, Self::SourceNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, InvoicingError>;
