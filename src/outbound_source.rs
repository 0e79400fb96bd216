//! Locating and loading the bot's monthly outbound files.

use chrono::Datelike;
use regex::Regex;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{InvoicingError, Result};
use crate::record::OutboundRecord;
use crate::sheet::{
    cell_to_integer, cell_to_text, cell_to_timestamp, find_header_row, read_table, AliasSpec,
    Cell, SheetTable,
};

pub const DEFAULT_FILE_PATTERN: &str = "*Outbound_{MM}*{YYYY}.xlsx";

const INVOICE_NUMBER: &str = "invoice_number";
const PATIENT_REF: &str = "patient_ref";
const VISIT_NUMBER: &str = "visit_number";
const LOCATION: &str = "location";
const COMMENTS: &str = "comments";
const REASON: &str = "reason";
const RETRIEVAL_STATUS: &str = "retrieval_status";
const RETRIEVAL_DESCRIPTION: &str = "retrieval_description";
const CREATED_AT: &str = "created_at";
const BOT_REQUEST_AT: &str = "bot_request_at";
const LAST_MODIFIED_AT: &str = "last_modified_at";
const ATTEMPT_COUNT: &str = "attempt_count_raw";
const BOT_NAME: &str = "bot_name";

const COLUMN_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: INVOICE_NUMBER,
        aliases: &["INVNUM", "Invoice Number", "InvoiceNum"],
    },
    AliasSpec {
        field: PATIENT_REF,
        aliases: &["MRN", "Patient Ref", "Medical Record Number"],
    },
    AliasSpec {
        field: VISIT_NUMBER,
        aliases: &["VisitNumber", "Visit Num"],
    },
    AliasSpec {
        field: LOCATION,
        aliases: &["Location"],
    },
    AliasSpec {
        field: COMMENTS,
        aliases: &["CodifyComments", "Comments"],
    },
    AliasSpec {
        field: REASON,
        aliases: &["Reason"],
    },
    AliasSpec {
        field: RETRIEVAL_STATUS,
        aliases: &["RetrievalStatus"],
    },
    AliasSpec {
        field: RETRIEVAL_DESCRIPTION,
        aliases: &["RetrievalDescription"],
    },
    AliasSpec {
        field: CREATED_AT,
        aliases: &["CreatedDate", "Created Date", "Created At"],
    },
    AliasSpec {
        field: BOT_REQUEST_AT,
        aliases: &["BOTRequestDate", "Bot Request Date"],
    },
    AliasSpec {
        field: LAST_MODIFIED_AT,
        aliases: &["LastModifiedDate", "Last Modified Date"],
    },
    AliasSpec {
        field: ATTEMPT_COUNT,
        aliases: &["RecordAttemptCount", "Attempt Count"],
    },
    AliasSpec {
        field: BOT_NAME,
        aliases: &["BotName", "Bot"],
    },
];

const REQUIRED_COLUMNS: &[&str] = &[
    INVOICE_NUMBER,
    PATIENT_REF,
    VISIT_NUMBER,
    LOCATION,
    COMMENTS,
    REASON,
    RETRIEVAL_STATUS,
    RETRIEVAL_DESCRIPTION,
    CREATED_AT,
    BOT_REQUEST_AT,
    LAST_MODIFIED_AT,
    ATTEMPT_COUNT,
];

/// Where a month's outbound rows come from.
pub trait OutboundSource {
    /// Reads every table in the file set named for `month`/`year`. Fails with
    /// `SourceNotFound` when the set is empty.
    fn tables_for(&self, month: u32, year: i32) -> Result<Vec<SheetTable>>;

    /// Rows are kept only when their `BotName` equals this value.
    fn bot_name(&self) -> Option<&str> {
        None
    }

    /// True when one workbook holds every month. Such a source is read once
    /// per run and filtered on the target year as well as the month.
    fn is_consolidated(&self) -> bool {
        false
    }
}

/// Monthly files dropped by the bot into one directory, e.g.
/// `HomeCareDischarge_Outbound_12_2023.xlsx`.
#[derive(Debug, Clone)]
pub struct OutboundDirectory {
    dir: PathBuf,
    pattern: String,
}

impl OutboundDirectory {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    fn resolved_pattern(&self, month: u32, year: i32) -> String {
        self.pattern
            .replace("{MM}", &format!("{month:02}"))
            .replace("{YYYY}", &format!("{year:04}"))
    }

    pub fn matching_files(&self, month: u32, year: i32) -> Result<Vec<PathBuf>> {
        let resolved = self.resolved_pattern(month, year);
        let not_found = || InvoicingError::SourceNotFound {
            dir: self.dir.clone(),
            pattern: resolved.clone(),
        };
        if !self.dir.is_dir() {
            return Err(not_found());
        }
        let matcher = wildcard_regex(&resolved)?;

        let mut files = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                let name = e.file_name().to_string_lossy();
                if name.contains('~') {
                    debug!(file = %name, "skipping editor lock file");
                    return false;
                }
                matcher.is_match(&name)
            })
            .map(|e| e.into_path())
            .collect::<Vec<_>>();
        files.sort();
        if files.is_empty() {
            return Err(not_found());
        }
        Ok(files)
    }
}

impl OutboundSource for OutboundDirectory {
    fn tables_for(&self, month: u32, year: i32) -> Result<Vec<SheetTable>> {
        self.matching_files(month, year)?
            .iter()
            .map(|path| read_table(path))
            .collect()
    }
}

/// A consolidated transaction report covering many bots and months; every
/// call returns the same workbook.
#[derive(Debug)]
pub struct TransactionReport {
    path: PathBuf,
    bot_name: String,
    cache: OnceCell<SheetTable>,
}

impl TransactionReport {
    pub fn new(path: impl Into<PathBuf>, bot_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            bot_name: bot_name.into(),
            cache: OnceCell::new(),
        }
    }
}

impl OutboundSource for TransactionReport {
    fn tables_for(&self, _month: u32, _year: i32) -> Result<Vec<SheetTable>> {
        if let Some(table) = self.cache.get() {
            return Ok(vec![table.clone()]);
        }
        if !self.path.is_file() {
            return Err(InvoicingError::SourceNotFound {
                dir: self
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
                pattern: self
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            });
        }
        let table = read_table(&self.path)?;
        let _ = self.cache.set(table.clone());
        Ok(vec![table])
    }

    fn bot_name(&self) -> Option<&str> {
        Some(&self.bot_name)
    }

    fn is_consolidated(&self) -> bool {
        true
    }
}

/// Glob-style `*`/`?` template to an anchored, case-insensitive regex.
fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|e| InvoicingError::Config(format!("invalid file pattern '{pattern}': {e}")))
}

static EMPTY_CELL: Cell = Cell::Empty;

fn cell_at(row: &[Cell], idx: Option<usize>) -> &Cell {
    idx.and_then(|i| row.get(i)).unwrap_or(&EMPTY_CELL)
}

/// Types the rows of one table and keeps those created in `filter_month`
/// (and `filter_year`, when given).
fn typed_rows(
    table: &SheetTable,
    bot_name: Option<&str>,
    filter_month: u32,
    filter_year: Option<i32>,
) -> Result<Vec<OutboundRecord>> {
    let mut required = REQUIRED_COLUMNS.to_vec();
    if bot_name.is_some() {
        required.push(BOT_NAME);
    }
    let (header_idx, mapping) = find_header_row(table, COLUMN_SPECS, &required)?;

    let mut out = Vec::new();
    for (idx, row) in table.rows.iter().enumerate().skip(header_idx + 1) {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        let line = idx + 1;
        let get = |field: &str| cell_at(row, mapping.get(field).copied());
        let mismatch = |field: &str, detail: String| {
            InvoicingError::schema(&table.origin, format!("row {line}, column {field}: {detail}"))
        };

        if let Some(expected) = bot_name {
            if cell_to_text(get(BOT_NAME)) != expected {
                continue;
            }
        }

        let invoice_number =
            cell_to_integer(get(INVOICE_NUMBER)).map_err(|e| mismatch(INVOICE_NUMBER, e))?;
        let created_at = cell_to_timestamp(get(CREATED_AT)).map_err(|e| mismatch(CREATED_AT, e))?;
        let bot_request_at =
            cell_to_timestamp(get(BOT_REQUEST_AT)).map_err(|e| mismatch(BOT_REQUEST_AT, e))?;
        let last_modified_at =
            cell_to_timestamp(get(LAST_MODIFIED_AT)).map_err(|e| mismatch(LAST_MODIFIED_AT, e))?;

        let Some(created_at) = created_at else {
            continue;
        };
        if created_at.month() != filter_month {
            continue;
        }
        if filter_year.is_some_and(|y| created_at.year() != y) {
            continue;
        }

        let reason = cell_to_text(get(REASON));
        let mut comments = cell_to_text(get(COMMENTS));
        if comments.is_empty() {
            comments = reason.clone();
        }

        out.push(OutboundRecord {
            invoice_number,
            patient_ref: cell_to_text(get(PATIENT_REF)),
            visit_number: cell_to_text(get(VISIT_NUMBER)),
            location: cell_to_text(get(LOCATION)),
            comments,
            reason,
            retrieval_status: cell_to_text(get(RETRIEVAL_STATUS)),
            retrieval_description: cell_to_text(get(RETRIEVAL_DESCRIPTION)),
            created_at,
            bot_request_at,
            last_modified_at,
            attempt_count_raw: cell_to_text(get(ATTEMPT_COUNT)),
        });
    }
    Ok(out)
}

/// Loads the file set for `month`/`year`, keeping only rows created in
/// `filter_month`. A consolidated source is also filtered on `year`, since its
/// workbook spans every year. An empty result is not an error.
pub fn load_month(
    source: &dyn OutboundSource,
    month: u32,
    year: i32,
    filter_month: u32,
) -> Result<Vec<OutboundRecord>> {
    if !(1..=12).contains(&filter_month) {
        return Err(InvoicingError::InvalidPeriod(format!(
            "filter month must be between 1 and 12, got {filter_month}"
        )));
    }

    let filter_year = source.is_consolidated().then_some(year);
    let tables = source.tables_for(month, year)?;
    let mut records = Vec::new();
    for table in &tables {
        let rows = typed_rows(table, source.bot_name(), filter_month, filter_year)?;
        debug!(origin = %table.origin, kept = rows.len(), "filtered outbound table");
        records.extend(rows);
    }

    info!(
        file_month = month,
        file_year = year,
        filter_month,
        files = tables.len(),
        rows = records.len(),
        "loaded outbound source"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{outbound_csv, temp_dir, OUTBOUND_HEADER};
    use std::fs;

    #[test]
    fn matching_files_follow_pattern_and_skip_lock_files() {
        let dir = temp_dir("homecare_source_match");
        for name in [
            "HCD_Outbound_12_01_2023.csv",
            "HCD_Outbound_12_15_2023.csv",
            "~$HCD_Outbound_12_20_2023.csv",
            "HCD_Outbound_11_30_2023.csv",
            "HCD_Outbound_12_01_2024.csv",
            "notes.txt",
        ] {
            fs::write(dir.join(name), OUTBOUND_HEADER).expect("write fixture");
        }

        let source = OutboundDirectory::new(&dir, "*Outbound_{MM}*{YYYY}.csv");
        let files = source.matching_files(12, 2023).expect("files for 12/2023");
        let names = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["HCD_Outbound_12_01_2023.csv", "HCD_Outbound_12_15_2023.csv"]
        );

        let err = source.matching_files(2, 2023).expect_err("no February files");
        assert!(err.is_source_not_found());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_month_filters_by_created_month_and_fills_comments() {
        let dir = temp_dir("homecare_source_load");
        outbound_csv(
            &dir,
            "HCD_Outbound_12_2023.csv",
            &[
                "1001,MRN1,V1,WB,,MR PDF Saved,Done,,2023-12-04 09:00:00,2023-12-04 08:00:00,,[1/0]",
                "1002,MRN2,V2,WB,manual note,Visit Status,Done,,2023-11-30 23:30:00,,,[0/2]",
                "1003,MRN3,V3,WB,,Visit Type,Done,,2023-12-31 23:59:00,,,\"[0/1],[0/1]\"",
                ",,,,,,,,,,,",
            ],
        );

        let source = OutboundDirectory::new(&dir, "*Outbound_{MM}*{YYYY}.csv");
        let rows = load_month(&source, 12, 2023, 12).expect("load december");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].invoice_number, 1001);
        assert_eq!(rows[0].comments, "MR PDF Saved");
        assert!(rows[0].bot_request_at.is_some());
        assert_eq!(rows[0].last_modified_at, None);
        assert_eq!(rows[1].invoice_number, 1003);
        assert_eq!(rows[1].attempt_count_raw, "[0/1],[0/1]");

        let november = load_month(&source, 12, 2023, 11).expect("load november rows");
        assert_eq!(november.len(), 1);
        assert_eq!(november[0].comments, "manual note");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn non_integer_invoice_number_is_a_schema_mismatch() {
        let dir = temp_dir("homecare_source_schema");
        outbound_csv(
            &dir,
            "HCD_Outbound_03_2024.csv",
            &["INV-9,MRN1,V1,WB,,MR PDF Saved,Done,,2024-03-04 09:00:00,,,[1/0]"],
        );

        let source = OutboundDirectory::new(&dir, "*Outbound_{MM}*{YYYY}.csv");
        let err = load_month(&source, 3, 2024, 3).expect_err("must fail");
        match err {
            InvoicingError::SchemaMismatch { detail, .. } => {
                assert!(detail.contains("row 2"), "{detail}");
                assert!(detail.contains(INVOICE_NUMBER), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_source_not_found() {
        let dir = temp_dir("homecare_source_missing").join("absent");
        let source = OutboundDirectory::new(&dir, DEFAULT_FILE_PATTERN);
        let err = load_month(&source, 1, 2024, 1).expect_err("must fail");
        assert!(err.is_source_not_found());
    }

    #[test]
    fn transaction_report_keeps_only_the_configured_bot() {
        let dir = temp_dir("homecare_source_report");
        let path = dir.join("Transaction Report.csv");
        let csv = format!(
            "{OUTBOUND_HEADER},BotName\n\
             2001,MRN1,V1,WB,,MR PDF Saved,Done,,2024-05-02 10:00:00,,,[1/0],HomeCareDischarge\n\
             2002,MRN2,V2,WB,,MR PDF Saved,Done,,2024-05-02 11:00:00,,,[1/0],OtherBot\n\
             not-a-number,MRN3,V3,WB,,MR PDF Saved,Done,,2024-05-02 11:00:00,,,[1/0],OtherBot\n\
             2003,MRN4,V4,WB,,Visit Type,Done,,2023-05-09 08:00:00,,,[0/1],HomeCareDischarge\n"
        );
        fs::write(&path, csv).expect("write report fixture");

        let source = TransactionReport::new(&path, "HomeCareDischarge");
        let rows = load_month(&source, 5, 2024, 5).expect("load report");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].invoice_number, 2001);

        let again = load_month(&source, 5, 2024, 5).expect("cached report");
        assert_eq!(again, rows);

        let earlier = load_month(&source, 5, 2023, 5).expect("load previous year");
        assert_eq!(
            earlier.iter().map(|r| r.invoice_number).collect::<Vec<_>>(),
            vec![2003]
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_filter_month_is_rejected() {
        let source = OutboundDirectory::new("unused", DEFAULT_FILE_PATTERN);
        assert!(matches!(
            load_month(&source, 1, 2024, 13),
            Err(InvoicingError::InvalidPeriod(_))
        ));
    }
}
