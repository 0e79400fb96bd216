//! Multi-sheet invoicing workbook.
//!
//! The workbook is saved under a temporary name next to its destination and
//! renamed into place, so a failed run never leaves a half-written report.

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::error::{InvoicingError, Result};
use crate::period::ReportPeriod;
use crate::pivot::CategoryPivot;
use crate::record::InvoiceRow;
use crate::sheet::datetime_to_excel_serial;

pub const INVOICING_SHEET: &str = "Invoicing";
pub const FINAL_SHEET: &str = "Final";

pub const ROW_HEADERS: [&str; 17] = [
    "INVNUM",
    "MRN",
    "VisitNumber",
    "Location",
    "CodifyComments",
    "Reason",
    "Category",
    "RetrievalStatus",
    "RetrievalDescription",
    "CreatedDate",
    "BOTRequestDate",
    "LastModifiedDate",
    "RecordAttemptCount",
    "CareportSuccessCount",
    "CareportFailureCount",
    "SunriseSuccessCount",
    "SunriseFailureCount",
];

const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

pub struct ReportContents<'a> {
    pub invoicing: &'a [InvoiceRow],
    pub final_rows: &'a [InvoiceRow],
    pub pivots: &'a [CategoryPivot],
}

/// `<output_dir>/<YYYY>/<MM> <YYYY>.xlsx`
pub fn report_path(output_dir: &Path, period: ReportPeriod) -> PathBuf {
    output_dir.join(period.year_text()).join(format!(
        "{} {}.xlsx",
        period.month_text(),
        period.year_text()
    ))
}

fn write_text(ws: &mut Worksheet, row: u32, col: u16, text: &str) -> std::result::Result<(), XlsxError> {
    if !text.is_empty() {
        ws.write_string(row, col, text)?;
    }
    Ok(())
}

fn write_timestamp(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    ts: Option<&NaiveDateTime>,
    format: &Format,
) -> std::result::Result<(), XlsxError> {
    if let Some(ts) = ts {
        ws.write_number_with_format(row, col, datetime_to_excel_serial(ts), format)?;
    }
    Ok(())
}

fn write_rows_sheet(
    workbook: &mut Workbook,
    name: &str,
    rows: &[InvoiceRow],
) -> std::result::Result<(), XlsxError> {
    let header = Format::new().set_bold();
    let datetime = Format::new().set_num_format(DATETIME_NUM_FORMAT);

    let ws = workbook.add_worksheet();
    ws.set_name(name)?;
    for (col, title) in ROW_HEADERS.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for col in 9..=11 {
        ws.set_column_width(col, 20)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let r = idx as u32 + 1;
        let rec = &row.record;
        ws.write_number(r, 0, rec.invoice_number as f64)?;
        write_text(ws, r, 1, &rec.patient_ref)?;
        write_text(ws, r, 2, &rec.visit_number)?;
        write_text(ws, r, 3, &rec.location)?;
        write_text(ws, r, 4, &rec.comments)?;
        write_text(ws, r, 5, &rec.reason)?;
        write_text(ws, r, 6, row.category.label().unwrap_or_default())?;
        write_text(ws, r, 7, &rec.retrieval_status)?;
        write_text(ws, r, 8, &rec.retrieval_description)?;
        write_timestamp(ws, r, 9, Some(&rec.created_at), &datetime)?;
        write_timestamp(ws, r, 10, rec.bot_request_at.as_ref(), &datetime)?;
        write_timestamp(ws, r, 11, rec.last_modified_at.as_ref(), &datetime)?;
        write_text(ws, r, 12, &rec.attempt_count_raw)?;
        ws.write_number(r, 13, row.attempts.careport_success)?;
        ws.write_number(r, 14, row.attempts.careport_failure)?;
        ws.write_number(r, 15, row.attempts.sunrise_success)?;
        ws.write_number(r, 16, row.attempts.sunrise_failure)?;
    }
    Ok(())
}

fn write_pivot_sheet(
    workbook: &mut Workbook,
    pivot: &CategoryPivot,
) -> std::result::Result<(), XlsxError> {
    let header = Format::new().set_bold();

    let ws = workbook.add_worksheet();
    ws.set_name(pivot.subsystem.sheet_name())?;
    ws.write_string_with_format(
        0,
        0,
        format!("Category / {}", pivot.subsystem.counter_header()),
        &header,
    )?;
    ws.set_column_width(0, 36)?;
    for (i, value) in pivot.counter_values.iter().enumerate() {
        ws.write_number_with_format(0, i as u16 + 1, *value, &header)?;
    }
    let total_col = pivot.counter_values.len() as u16 + 1;
    ws.write_string_with_format(0, total_col, "Total", &header)?;

    for (idx, row) in pivot.rows.iter().enumerate() {
        let r = idx as u32 + 1;
        ws.write_string(r, 0, row.category)?;
        for (i, count) in row.counts.iter().enumerate() {
            ws.write_number(r, i as u16 + 1, *count as f64)?;
        }
        ws.write_number(r, total_col, row.total as f64)?;
    }
    Ok(())
}

fn build_workbook(contents: &ReportContents<'_>) -> std::result::Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    write_rows_sheet(&mut workbook, INVOICING_SHEET, contents.invoicing)?;
    write_rows_sheet(&mut workbook, FINAL_SHEET, contents.final_rows)?;
    for pivot in contents.pivots {
        write_pivot_sheet(&mut workbook, pivot)?;
    }
    Ok(workbook)
}

/// Writes the report for `period`, creating the year directory when needed,
/// and returns the final path.
pub fn write_report(
    output_dir: &Path,
    period: ReportPeriod,
    contents: &ReportContents<'_>,
) -> Result<PathBuf> {
    let path = report_path(output_dir, period);
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_dir.to_path_buf());
    fs::create_dir_all(&dir).map_err(|e| InvoicingError::write_failure(&dir, e))?;

    let mut workbook = build_workbook(contents).map_err(|e| InvoicingError::write_failure(&path, e))?;

    let tmp_path = dir.join(format!(
        ".{} {}.{}.xlsx",
        period.month_text(),
        period.year_text(),
        Uuid::new_v4()
    ));
    if let Err(e) = workbook.save(&tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(InvoicingError::write_failure(&path, e));
    }
    if let Err(e) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(InvoicingError::write_failure(&path, e));
    }

    info!(
        path = %path.display(),
        invoicing_rows = contents.invoicing.len(),
        final_rows = contents.final_rows.len(),
        pivots = contents.pivots.len(),
        "wrote invoicing report"
    );
    Ok(path)
}
