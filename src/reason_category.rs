use serde::{Serialize, Serializer};
use std::fmt;

/// Outcome categories for the bot's free-text `Reason` column.
///
/// The mapping is total: text that matches none of the known bot messages is
/// `Unrecognized` rather than silently dropped, and carries no label in the
/// report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReasonCategory {
    ResponseReasonNotMatched,
    VisitStatusNotMatched,
    MrPdfSaved,
    NoDocumentsFound,
    ReferralIdValidationFailed,
    NoPatientInfoFound,
    VisitTypeNotMatched,
    Unrecognized,
}

const REASON_TABLE: &[(&str, ReasonCategory)] = &[
    (
        "Response Reason is not 'Yes'",
        ReasonCategory::ResponseReasonNotMatched,
    ),
    ("Visit Status", ReasonCategory::VisitStatusNotMatched),
    ("MR PDF Saved", ReasonCategory::MrPdfSaved),
    (
        "Documents do not match criteria",
        ReasonCategory::NoDocumentsFound,
    ),
    (
        "Referral Number in Patient Info header",
        ReasonCategory::ReferralIdValidationFailed,
    ),
    ("Patient Information", ReasonCategory::NoPatientInfoFound),
    ("Visit Type", ReasonCategory::VisitTypeNotMatched),
];

impl ReasonCategory {
    pub const RECOGNIZED: [ReasonCategory; 7] = [
        ReasonCategory::ResponseReasonNotMatched,
        ReasonCategory::VisitStatusNotMatched,
        ReasonCategory::MrPdfSaved,
        ReasonCategory::NoDocumentsFound,
        ReasonCategory::ReferralIdValidationFailed,
        ReasonCategory::NoPatientInfoFound,
        ReasonCategory::VisitTypeNotMatched,
    ];

    pub fn label(self) -> Option<&'static str> {
        match self {
            ReasonCategory::ResponseReasonNotMatched => Some("Response Reason Not Matched"),
            ReasonCategory::VisitStatusNotMatched => Some("Visit Status Not Matched"),
            ReasonCategory::MrPdfSaved => Some("MR PDF Saved"),
            ReasonCategory::NoDocumentsFound => Some("No Documents Found"),
            ReasonCategory::ReferralIdValidationFailed => Some("Referral ID Validation Failed"),
            ReasonCategory::NoPatientInfoFound => Some("No Patient Info Found"),
            ReasonCategory::VisitTypeNotMatched => Some("Visit Type Not Matched"),
            ReasonCategory::Unrecognized => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == ReasonCategory::MrPdfSaved
    }
}

impl fmt::Display for ReasonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().unwrap_or(""))
    }
}

impl Serialize for ReasonCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.label() {
            Some(label) => serializer.serialize_str(label),
            None => serializer.serialize_none(),
        }
    }
}

/// Matches the whole reason text (surrounding whitespace ignored) against the
/// bot's fixed messages.
pub fn categorize(raw_reason: &str) -> ReasonCategory {
    let reason = raw_reason.trim();
    REASON_TABLE
        .iter()
        .find(|(text, _)| *text == reason)
        .map(|(_, category)| *category)
        .unwrap_or(ReasonCategory::Unrecognized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_bot_messages_map_to_their_labels() {
        assert_eq!(categorize("Visit Status").label(), Some("Visit Status Not Matched"));
        assert_eq!(
            categorize("Response Reason is not 'Yes'").label(),
            Some("Response Reason Not Matched")
        );
        assert_eq!(categorize(" MR PDF Saved ").label(), Some("MR PDF Saved"));
        assert_eq!(
            categorize("Referral Number in Patient Info header"),
            ReasonCategory::ReferralIdValidationFailed
        );
        assert!(categorize("MR PDF Saved").is_success());
    }

    #[test]
    fn unknown_text_is_unrecognized_without_label() {
        let category = categorize("unrecognized text");
        assert_eq!(category, ReasonCategory::Unrecognized);
        assert_eq!(category.label(), None);
        assert_eq!(category.to_string(), "");
        assert_eq!(categorize(""), ReasonCategory::Unrecognized);
        // partial matches do not count
        assert_eq!(categorize("Visit Status Pending"), ReasonCategory::Unrecognized);
    }

    #[test]
    fn every_recognized_category_has_one_source_message() {
        for category in ReasonCategory::RECOGNIZED {
            let sources = REASON_TABLE.iter().filter(|(_, c)| *c == category).count();
            assert_eq!(sources, 1, "{category:?}");
            assert!(category.label().is_some());
        }
    }
}
