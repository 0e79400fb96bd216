use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::month_reconcile::{reconcile, MissingSourcePolicy, SourceContribution};
use crate::outbound_source::OutboundSource;
use crate::period::ReportPeriod;
use crate::pivot::{build_pivots, CategoryPivot};
use crate::reason_category::ReasonCategory;
use crate::record::{annotate, InvoiceRow};
use crate::report_writer::{write_report, ReportContents};
use crate::success_dedupe::dedupe_successes;

/// Everything computed for one month before it is written out.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoicingRun {
    pub period: ReportPeriod,
    pub sources: Vec<SourceContribution>,
    pub duplicates_removed: usize,
    pub invoicing: Vec<InvoiceRow>,
    pub final_rows: Vec<InvoiceRow>,
    pub pivots: Vec<CategoryPivot>,
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub category: ReasonCategory,
    pub invoicing_rows: usize,
    pub final_rows: usize,
}

impl InvoicingRun {
    pub fn category_counts(&self) -> Vec<CategoryCount> {
        let mut counts: BTreeMap<_, (usize, usize)> = BTreeMap::new();
        for row in &self.invoicing {
            counts.entry(row.category).or_default().0 += 1;
        }
        for row in &self.final_rows {
            counts.entry(row.category).or_default().1 += 1;
        }
        counts
            .into_iter()
            .map(|(category, (invoicing_rows, final_rows))| CategoryCount {
                category,
                invoicing_rows,
                final_rows,
            })
            .collect()
    }
}

pub fn build_invoicing(
    source: &dyn OutboundSource,
    period: ReportPeriod,
    policy: MissingSourcePolicy,
    with_pivots: bool,
) -> Result<InvoicingRun> {
    let reconciled = reconcile(source, period, policy)?;
    let invoicing = annotate(reconciled.records);
    let final_rows = dedupe_successes(invoicing.clone());
    let pivots = if with_pivots {
        build_pivots(&final_rows)
    } else {
        Vec::new()
    };

    Ok(InvoicingRun {
        period,
        sources: reconciled.sources,
        duplicates_removed: reconciled.duplicates_removed,
        invoicing,
        final_rows,
        pivots,
    })
}

#[derive(Debug)]
pub struct ReportOutcome {
    pub output_path: PathBuf,
    pub run: InvoicingRun,
}

impl ReportOutcome {
    pub fn summary_json(&self) -> Value {
        json!({
            "period": self.run.period.to_string(),
            "output_path": self.output_path.to_string_lossy(),
            "sources": self.run.sources,
            "duplicates_removed": self.run.duplicates_removed,
            "invoicing_rows": self.run.invoicing.len(),
            "final_rows": self.run.final_rows.len(),
            "categories": self.run.category_counts(),
            "pivots": self.run.pivots,
        })
    }
}

/// Reconciles, annotates and deduplicates `period`, then writes the workbook
/// under the configured output directory.
pub fn run_monthly_report(config: &ReportConfig, period: ReportPeriod) -> Result<ReportOutcome> {
    info!(%period, source_mode = ?config.source_mode, "starting invoicing run");
    let source = config.outbound_source()?;
    let run = build_invoicing(source.as_ref(), period, config.missing_sources, config.pivots)?;
    let output_path = write_report(
        &config.output_dir,
        period,
        &ReportContents {
            invoicing: &run.invoicing,
            final_rows: &run.final_rows,
            pivots: &run.pivots,
        },
    )?;
    Ok(ReportOutcome { output_path, run })
}
