use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{InvoicingError, Result};
use crate::month_reconcile::MissingSourcePolicy;
use crate::outbound_source::{
    OutboundDirectory, OutboundSource, TransactionReport, DEFAULT_FILE_PATTERN,
};

pub const DEFAULT_BOT_NAME: &str = "HomeCareDischarge";
const DEFAULT_OUTPUT_DIR: &str = "invoicing";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// One or more `*Outbound_<MM>*<YYYY>` files per month.
    #[default]
    OutboundFiles,
    /// A single consolidated report filtered by `BotName`.
    TransactionReport,
}

/// Run configuration. Every field has a default so a partial TOML file (or
/// none at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub source_dir: PathBuf,
    pub file_pattern: String,
    pub source_mode: SourceMode,
    pub transaction_report: Option<PathBuf>,
    pub bot_name: String,
    pub output_dir: PathBuf,
    pub missing_sources: MissingSourcePolicy,
    pub pivots: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            source_mode: SourceMode::default(),
            transaction_report: None,
            bot_name: DEFAULT_BOT_NAME.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            missing_sources: MissingSourcePolicy::default(),
            pivots: true,
        }
    }
}

impl ReportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| InvoicingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            InvoicingError::Config(format!("cannot read {}: {e}", path.to_string_lossy()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_pattern.trim().is_empty() {
            return Err(InvoicingError::Config("file_pattern must not be empty".to_string()));
        }
        if self.source_mode == SourceMode::TransactionReport {
            if self.transaction_report.is_none() {
                return Err(InvoicingError::Config(
                    "transaction_report path is required in transaction_report mode".to_string(),
                ));
            }
            if self.bot_name.trim().is_empty() {
                return Err(InvoicingError::Config("bot_name must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn outbound_source(&self) -> Result<Box<dyn OutboundSource>> {
        self.validate()?;
        match (self.source_mode, &self.transaction_report) {
            (SourceMode::TransactionReport, Some(path)) => Ok(Box::new(TransactionReport::new(
                path,
                self.bot_name.trim(),
            ))),
            _ => Ok(Box::new(OutboundDirectory::new(
                &self.source_dir,
                self.file_pattern.trim(),
            ))),
        }
    }
}
