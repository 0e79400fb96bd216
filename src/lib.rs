pub mod attempt_counts;
pub mod config;
pub mod error;
pub mod month_reconcile;
pub mod outbound_source;
pub mod period;
pub mod pipeline;
pub mod pivot;
pub mod reason_category;
pub mod record;
pub mod report_writer;
pub mod sheet;
pub mod success_dedupe;

#[cfg(test)]
mod test_support;

pub use attempt_counts::{parse_attempts, AttemptCounts};
pub use config::{ReportConfig, SourceMode};
pub use error::{InvoicingError, Result};
pub use month_reconcile::{reconcile, MissingSourcePolicy, ReconciledMonth};
pub use outbound_source::{load_month, OutboundDirectory, OutboundSource, TransactionReport};
pub use period::{next_month_year, prior_month_year, ReportPeriod};
pub use pipeline::{build_invoicing, run_monthly_report, InvoicingRun, ReportOutcome};
pub use reason_category::{categorize, ReasonCategory};
pub use record::{annotate, InvoiceRow, OutboundRecord};
pub use success_dedupe::dedupe_successes;
