use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::error::{InvoicingError, Result};

/// A calendar month being invoiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReportPeriod {
    pub month: u32,
    pub year: i32,
}

impl ReportPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(InvoicingError::InvalidPeriod(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if !(1900..=9999).contains(&year) {
            return Err(InvoicingError::InvalidPeriod(format!(
                "year must be a 4-digit year, got {year}"
            )));
        }
        Ok(Self { month, year })
    }

    /// The month before `today`'s month, which is what a run at the start of
    /// a month is expected to invoice.
    pub fn previous_calendar_month(today: NaiveDate) -> Self {
        let (month, year) = prior_month_year(today.month(), today.year());
        Self { month, year }
    }

    pub fn prior(self) -> Self {
        let (month, year) = prior_month_year(self.month, self.year);
        Self { month, year }
    }

    pub fn next(self) -> Self {
        let (month, year) = next_month_year(self.month, self.year);
        Self { month, year }
    }

    pub fn month_text(self) -> String {
        format!("{:02}", self.month)
    }

    pub fn year_text(self) -> String {
        format!("{:04}", self.year)
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

pub fn prior_month_year(month: u32, year: i32) -> (u32, i32) {
    if month == 1 {
        (12, year - 1)
    } else {
        (month - 1, year)
    }
}

pub fn next_month_year(month: u32, year: i32) -> (u32, i32) {
    if month == 12 {
        (1, year + 1)
    } else {
        (month + 1, year)
    }
}
