//! Raw tabular input: spreadsheet and CSV readers plus the cell coercions the
//! loader applies to them.

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{InvoicingError, Result};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(raw: &str) -> Self {
        let trimmed = trim_cell(raw);
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// All rows of one input file (header rows included), tagged with where they
/// came from so coercion errors can name the file.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub origin: String,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug)]
pub struct AliasSpec {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

pub fn trim_cell(text: &str) -> String {
    text.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

pub fn normalize_key(key: &str) -> String {
    trim_cell(key)
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect()
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_datetime(serial)
                .map(Cell::DateTime)
                .unwrap_or(Cell::Number(serial))
        }
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
    }
}

pub fn read_xlsx_table(path: &Path) -> Result<SheetTable> {
    let origin = path.to_string_lossy().to_string();
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| InvoicingError::schema(&origin, format!("cannot open workbook: {e}")))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let first_sheet = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| InvoicingError::schema(&origin, "workbook has no worksheets"))?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| InvoicingError::schema(&origin, format!("cannot read worksheet: {e}")))?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    Ok(SheetTable { origin, rows })
}

pub fn read_csv_table(path: &Path) -> Result<SheetTable> {
    let origin = path.to_string_lossy().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| InvoicingError::schema(&origin, format!("cannot open csv: {e}")))?;

    let mut rows = Vec::new();
    for rec in reader.records() {
        let rec = rec.map_err(|e| InvoicingError::schema(&origin, format!("bad csv row: {e}")))?;
        rows.push(rec.iter().map(Cell::text).collect());
    }
    Ok(SheetTable { origin, rows })
}

/// Reads a source file, choosing the reader from its extension.
pub fn read_table(path: &Path) -> Result<SheetTable> {
    let suffix = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match suffix.as_str() {
        "csv" => read_csv_table(path),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_xlsx_table(path),
        _ => Err(InvoicingError::schema(
            path.to_string_lossy(),
            format!("unsupported file type .{suffix} (expected .xlsx or .csv)"),
        )),
    }
}

fn header_text(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        _ => String::new(),
    }
}

fn resolve_alias_mapping_from_row(row: &[Cell], specs: &[AliasSpec]) -> HashMap<&'static str, usize> {
    let mut normalized: HashMap<String, usize> = HashMap::new();
    for (idx, cell) in row.iter().enumerate() {
        let key = normalize_key(&header_text(cell));
        if !key.is_empty() {
            normalized.entry(key).or_insert(idx);
        }
    }

    let mut mapping = HashMap::new();
    for spec in specs {
        for alias in spec.aliases {
            if let Some(idx) = normalized.get(&normalize_key(alias)) {
                mapping.insert(spec.field, *idx);
                break;
            }
        }
    }
    mapping
}

/// Finds the first row carrying every required column. Report exports put a
/// title block above the header, so the header is not always row 0.
pub fn find_header_row(
    table: &SheetTable,
    specs: &[AliasSpec],
    required: &[&str],
) -> Result<(usize, HashMap<&'static str, usize>)> {
    let mut best: Option<(usize, HashMap<&'static str, usize>)> = None;
    'outer: for (idx, row) in table.rows.iter().enumerate() {
        let mapping = resolve_alias_mapping_from_row(row, specs);
        for req in required {
            if !mapping.contains_key(*req) {
                if best.as_ref().map_or(true, |(_, m)| m.len() < mapping.len()) {
                    best = Some((idx, mapping));
                }
                continue 'outer;
            }
        }
        return Ok((idx, mapping));
    }

    let found = best.map(|(_, m)| m).unwrap_or_default();
    let missing = required
        .iter()
        .filter(|req| !found.contains_key(**req))
        .copied()
        .collect::<Vec<_>>();
    Err(InvoicingError::schema(
        &table.origin,
        format!("missing required columns: {}", missing.join(", ")),
    ))
}

/// Converts an Excel serial day number (1900 date system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial <= 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(Duration::milliseconds(millis))
}

/// Inverse of [`excel_serial_to_datetime`].
pub fn datetime_to_excel_serial(ts: &NaiveDateTime) -> f64 {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*ts - base).num_milliseconds() as f64 / 86_400_000.0
}

pub fn parse_timestamp_text(raw: &str) -> Option<NaiveDateTime> {
    let text = trim_cell(raw);
    if text.is_empty() {
        return None;
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&text, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    text.parse::<f64>().ok().and_then(excel_serial_to_datetime)
}

pub fn cell_to_timestamp(cell: &Cell) -> std::result::Result<Option<NaiveDateTime>, String> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::DateTime(ts) => Ok(Some(*ts)),
        Cell::Number(n) => excel_serial_to_datetime(*n)
            .map(Some)
            .ok_or_else(|| format!("{n} is not a valid date serial")),
        Cell::Text(s) => parse_timestamp_text(s)
            .map(Some)
            .ok_or_else(|| format!("unrecognized timestamp '{s}'")),
    }
}

/// Whole values inside the `i64` range; `i64::MAX as f64` rounds up to 2^63,
/// hence the exclusive upper bound.
fn whole_f64_to_i64(v: f64) -> Option<i64> {
    let in_range = v >= i64::MIN as f64 && v < i64::MAX as f64;
    (v.is_finite() && v.fract() == 0.0 && in_range).then_some(v as i64)
}

pub fn cell_to_integer(cell: &Cell) -> std::result::Result<i64, String> {
    match cell {
        Cell::Empty => Err("value is empty".to_string()),
        Cell::Number(n) => whole_f64_to_i64(*n).ok_or_else(|| format!("{n} is not an integer")),
        Cell::DateTime(ts) => Err(format!("{ts} is a date, not an integer")),
        Cell::Text(s) => {
            let text = s.replace(',', "");
            if let Ok(v) = text.parse::<i64>() {
                return Ok(v);
            }
            text.parse::<f64>()
                .ok()
                .and_then(whole_f64_to_i64)
                .ok_or_else(|| format!("'{s}' is not an integer"))
        }
    }
}

pub fn cell_to_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(s) => s.clone(),
        Cell::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
            format!("{}", *n as i64)
        }
        Cell::Number(n) => n.to_string(),
        Cell::DateTime(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    const SPECS: &[AliasSpec] = &[
        AliasSpec {
            field: "invoice",
            aliases: &["INVNUM", "Invoice Number"],
        },
        AliasSpec {
            field: "created",
            aliases: &["CreatedDate"],
        },
    ];

    fn create_temp_path(prefix: &str, ext: &str) -> PathBuf {
        let unique = format!("{prefix}_{}_{}.{}", std::process::id(), Uuid::new_v4(), ext);
        std::env::temp_dir().join(unique)
    }

    fn table(rows: Vec<Vec<Cell>>) -> SheetTable {
        SheetTable {
            origin: "fixture".to_string(),
            rows,
        }
    }

    #[test]
    fn header_row_is_found_below_title_rows() {
        let t = table(vec![
            vec![Cell::text("HomeCareDischarge Outbound")],
            vec![],
            vec![Cell::text(" invoice number "), Cell::text("created_date")],
            vec![Cell::Number(1.0), Cell::text("2024-01-01")],
        ]);
        let (idx, mapping) = find_header_row(&t, SPECS, &["invoice", "created"]).expect("header");
        assert_eq!(idx, 2);
        assert_eq!(mapping.get("invoice"), Some(&0));
        assert_eq!(mapping.get("created"), Some(&1));
    }

    #[test]
    fn missing_required_column_is_a_schema_mismatch() {
        let t = table(vec![vec![Cell::text("INVNUM"), Cell::text("Reason")]]);
        let err = find_header_row(&t, SPECS, &["invoice", "created"]).expect_err("must fail");
        match err {
            InvoicingError::SchemaMismatch { origin, detail } => {
                assert_eq!(origin, "fixture");
                assert!(detail.contains("created"), "{detail}");
                assert!(!detail.contains("invoice"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn timestamps_parse_from_text_serials_and_native_cells() {
        let expected = NaiveDate::from_ymd_opt(2023, 12, 5)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .expect("valid timestamp");
        assert_eq!(
            cell_to_timestamp(&Cell::text("2023-12-05 14:30:00")),
            Ok(Some(expected))
        );
        assert_eq!(
            cell_to_timestamp(&Cell::text("12/05/2023 02:30:00 PM")),
            Ok(Some(expected))
        );
        // 45265 = 2023-12-05, plus 14.5 hours
        assert_eq!(
            cell_to_timestamp(&Cell::Number(45265.0 + 14.5 / 24.0)),
            Ok(Some(expected))
        );
        assert_eq!(cell_to_timestamp(&Cell::DateTime(expected)), Ok(Some(expected)));
        assert_eq!(cell_to_timestamp(&Cell::Empty), Ok(None));
        assert!(cell_to_timestamp(&Cell::text("next tuesday")).is_err());
    }

    #[test]
    fn integers_accept_integral_numbers_and_text_only() {
        assert_eq!(cell_to_integer(&Cell::Number(1042.0)), Ok(1042));
        assert_eq!(cell_to_integer(&Cell::text("1042")), Ok(1042));
        assert_eq!(cell_to_integer(&Cell::text("1042.0")), Ok(1042));
        assert!(cell_to_integer(&Cell::Number(10.5)).is_err());
        assert!(cell_to_integer(&Cell::text("INV-1")).is_err());
        assert!(cell_to_integer(&Cell::Empty).is_err());
        assert!(cell_to_integer(&Cell::Number(1e20)).is_err());
        assert!(cell_to_integer(&Cell::text("1e20")).is_err());
        assert!(cell_to_integer(&Cell::Number(-1e20)).is_err());
        assert_eq!(cell_to_integer(&Cell::Number(9.0e15)), Ok(9_000_000_000_000_000));
        assert_eq!(cell_to_text(&Cell::Number(778899.0)), "778899");
    }

    #[test]
    fn csv_tables_are_read_with_trimmed_cells() {
        let path = create_temp_path("homecare_sheet_fixture", "csv");
        fs::write(&path, "\u{feff}INVNUM, CreatedDate \n 7 ,2024-01-02 08:00:00\n,\n")
            .expect("write csv fixture");

        let t = read_table(&path).expect("read csv");
        assert_eq!(t.rows.len(), 3);
        assert_eq!(t.rows[0], vec![Cell::text("INVNUM"), Cell::text("CreatedDate")]);
        assert_eq!(t.rows[1][0], Cell::Text("7".to_string()));
        assert!(t.rows[2].iter().all(Cell::is_empty));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = read_table(Path::new("notes.txt")).expect_err("must fail");
        assert!(matches!(err, InvoicingError::SchemaMismatch { .. }));
    }
}
