use chrono::NaiveDateTime;

use crate::attempt_counts::{parse_attempts, AttemptCounts};
use crate::reason_category::{categorize, ReasonCategory};

/// One row of the bot's outbound log after column projection and typing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutboundRecord {
    pub invoice_number: i64,
    pub patient_ref: String,
    pub visit_number: String,
    pub location: String,
    pub comments: String,
    pub reason: String,
    pub retrieval_status: String,
    pub retrieval_description: String,
    pub created_at: NaiveDateTime,
    pub bot_request_at: Option<NaiveDateTime>,
    pub last_modified_at: Option<NaiveDateTime>,
    pub attempt_count_raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRow {
    pub record: OutboundRecord,
    pub attempts: AttemptCounts,
    pub category: ReasonCategory,
}

impl InvoiceRow {
    pub fn from_record(record: OutboundRecord) -> Self {
        let attempts = parse_attempts(&record.attempt_count_raw);
        let category = categorize(&record.reason);
        Self {
            record,
            attempts,
            category,
        }
    }

    pub fn invoice_number(&self) -> i64 {
        self.record.invoice_number
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.record.created_at
    }
}

/// Adds the attempt counters and reason category to every reconciled row.
pub fn annotate(records: Vec<OutboundRecord>) -> Vec<InvoiceRow> {
    records.into_iter().map(InvoiceRow::from_record).collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid fixture timestamp")
    }

    pub fn record(invoice_number: i64, reason: &str, created_at: NaiveDateTime) -> OutboundRecord {
        OutboundRecord {
            invoice_number,
            patient_ref: format!("MRN{invoice_number}"),
            visit_number: format!("V{invoice_number}"),
            location: "WESTBURY".to_string(),
            comments: reason.to_string(),
            reason: reason.to_string(),
            retrieval_status: "Complete".to_string(),
            retrieval_description: String::new(),
            created_at,
            bot_request_at: Some(created_at),
            last_modified_at: None,
            attempt_count_raw: "[1/0]".to_string(),
        }
    }
}
