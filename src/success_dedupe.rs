use std::collections::HashSet;
use tracing::info;

use crate::record::InvoiceRow;

/// Keeps only the earliest `MR PDF Saved` row per invoice; every other row is
/// kept as is. The result is ordered by creation time, ties keeping their
/// input order.
pub fn dedupe_successes(rows: Vec<InvoiceRow>) -> Vec<InvoiceRow> {
    let (mut successes, others): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|row| row.category.is_success());

    successes.sort_by_key(InvoiceRow::created_at);
    let success_total = successes.len();
    let mut seen = HashSet::new();
    let mut combined = successes
        .into_iter()
        .filter(|row| seen.insert(row.invoice_number()))
        .collect::<Vec<_>>();
    let repeats = success_total - combined.len();

    combined.extend(others);
    combined.sort_by_key(InvoiceRow::created_at);

    info!(rows = combined.len(), repeated_successes = repeats, "deduplicated successes");
    combined
}
