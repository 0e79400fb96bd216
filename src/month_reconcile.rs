//! Cross-month reconciliation.
//!
//! The bot works overnight, so an account billed in a given month can sit in
//! the previous or the next month's outbound file. Every run therefore reads
//! three file sets and keeps only the rows created in the target month. A
//! consolidated report already holds every month and is read once.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::{InvoicingError, Result};
use crate::outbound_source::{load_month, OutboundSource};
use crate::period::ReportPeriod;
use crate::record::OutboundRecord;

/// What to do when one of the three file sets does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSourcePolicy {
    /// The missing set contributes nothing; the run fails only when all three
    /// are missing.
    #[default]
    TreatAsEmpty,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Contribution {
    Loaded { rows: usize },
    Empty,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceContribution {
    pub file_period: ReportPeriod,
    #[serde(flatten)]
    pub contribution: Contribution,
}

#[derive(Debug, Clone)]
pub struct ReconciledMonth {
    pub period: ReportPeriod,
    pub records: Vec<OutboundRecord>,
    pub sources: Vec<SourceContribution>,
    pub duplicates_removed: usize,
}

fn drop_exact_duplicates(records: Vec<OutboundRecord>) -> (Vec<OutboundRecord>, usize) {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let kept = records
        .into_iter()
        .filter(|rec| seen.insert(rec.clone()))
        .collect::<Vec<_>>();
    let removed = before - kept.len();
    (kept, removed)
}

pub fn reconcile(
    source: &dyn OutboundSource,
    period: ReportPeriod,
    policy: MissingSourcePolicy,
) -> Result<ReconciledMonth> {
    let file_periods = if source.is_consolidated() {
        vec![period]
    } else {
        vec![period.prior(), period, period.next()]
    };

    let mut parts = Vec::new();
    let mut sources = Vec::with_capacity(file_periods.len());
    let mut missing = Vec::new();
    for &file_period in &file_periods {
        let contribution = match load_month(source, file_period.month, file_period.year, period.month)
        {
            Ok(rows) if rows.is_empty() => Contribution::Empty,
            Ok(rows) => {
                let loaded = Contribution::Loaded { rows: rows.len() };
                parts.push(rows);
                loaded
            }
            Err(err) if err.is_source_not_found() && policy == MissingSourcePolicy::TreatAsEmpty => {
                warn!(%file_period, target = %period, error = %err, "outbound files missing, treating as empty");
                missing.push((file_period, err));
                Contribution::Missing
            }
            Err(err) => return Err(err),
        };
        sources.push(SourceContribution {
            file_period,
            contribution,
        });
    }

    if missing.len() == file_periods.len() {
        let current = missing
            .into_iter()
            .find(|(fp, _)| *fp == period)
            .map(|(_, err)| err);
        if let Some(err) = current {
            return Err(err);
        }
        return Err(InvoicingError::NoDataForMonth {
            month: period.month,
            year: period.year,
        });
    }

    let union = parts.into_iter().flatten().collect::<Vec<_>>();
    let (records, duplicates_removed) = drop_exact_duplicates(union);
    if records.is_empty() {
        return Err(InvoicingError::NoDataForMonth {
            month: period.month,
            year: period.year,
        });
    }
    debug_assert!(records.iter().all(|r| r.created_at.month() == period.month));
    debug_assert!(
        !source.is_consolidated() || records.iter().all(|r| r.created_at.year() == period.year)
    );

    info!(
        target = %period,
        rows = records.len(),
        duplicates_removed,
        "reconciled outbound month"
    );
    Ok(ReconciledMonth {
        period,
        records,
        sources,
        duplicates_removed,
    })
}
