//! Core logic for the inspection compliance dashboard: record model, deadline
//! arithmetic, status classification, filtering, unit ordering, pagination and
//! chart aggregation.
//!
//! Every operation here is a pure function over immutable inputs. Records are
//! validated once at the import boundary; nothing in this crate re-validates
//! them or returns an error for bad data.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod dates;
pub mod filter;
pub mod paginate;
pub mod snapshot;
pub mod status;
pub mod text;
pub mod units;

pub use aggregate::{aggregate_by, sum_by, top_n, GroupCount, GroupSum};
pub use dates::{
    days_remaining, days_remaining_at, days_remaining_str, excel_serial_to_date,
    format_localized, local_today, month_key, parse_calendar_date, MonthKey, NOT_DEFINED_LABEL,
};
pub use filter::{distinct_values, filter_records, FilterConfig, Filterable, RecordField};
pub use paginate::{clamp_page, page_window, paginate, Page};
pub use snapshot::{
    build_snapshot, deadline_rows, status_breakdown, unit_report, DashboardSnapshot, DeadlineRow,
    UnitReport,
};
pub use status::{
    classify_status, classify_status_with, ExplicitStatus, StatusCategory, Trackable,
};
pub use units::{collate, compare_units, sort_units, unit_number, UnitKey};

/// Thresholds and sizes the dashboard views share.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Upper bound (inclusive) of remaining days classified as near due.
    pub near_due_days: i64,
    /// Rows per table page.
    pub page_size: usize,
    /// Length of "top N" rankings.
    pub top_n: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            near_due_days: 7,
            page_size: 10,
            top_n: 10,
        }
    }
}

impl DashboardConfig {
    /// Reject values that would make the views meaningless.
    pub fn validate(&self) -> Result<(), ComplianceError> {
        if self.page_size == 0 {
            return Err(ComplianceError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.near_due_days < 0 {
            return Err(ComplianceError::InvalidConfig(format!(
                "near_due_days must not be negative, received {}",
                self.near_due_days
            )));
        }
        Ok(())
    }
}

/// One inspection finding, as produced by the spreadsheet import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct InspectionRecord {
    pub number: String,
    pub unit: String,
    pub department: String,
    pub inspected_on: Option<NaiveDate>,
    pub responsible_officer: String,
    /// Short non-conformity category.
    pub nc_category: String,
    /// Long non-conformity description.
    pub nc_description: String,
    pub initial_stage: String,
    pub intermediate_stage: String,
    pub conclusive_stage: String,
    pub remediation_start: Option<NaiveDate>,
    pub allotted_days: Option<u32>,
    pub remediation_end: Option<NaiveDate>,
    pub status: Option<String>,
    pub next_inspection_due: Option<NaiveDate>,
    pub criticality: String,
}

impl InspectionRecord {
    /// Identity used to detect duplicate imports.
    pub fn key(&self) -> InspectionKey {
        InspectionKey {
            number: self.number.trim().to_string(),
            unit: self.unit.trim().to_string(),
            department: self.department.trim().to_string(),
            nc_category: self.nc_category.trim().to_string(),
        }
    }

    /// Remediation deadline: the explicit end date, else start + allotted days.
    pub fn remediation_deadline(&self) -> Option<NaiveDate> {
        self.remediation_end.or_else(|| {
            let start = self.remediation_start?;
            let days = self.allotted_days?;
            start.checked_add_signed(Duration::days(i64::from(days)))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InspectionKey {
    pub number: String,
    pub unit: String,
    pub department: String,
    pub nc_category: String,
}

/// Lifecycle of a tracked regularization deadline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    #[default]
    Pending,
    Regularized,
    NotRegularized,
}

impl ControlStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlStatus::Pending => "pending",
            ControlStatus::Regularized => "regularized",
            ControlStatus::NotRegularized => "not_regularized",
        }
    }
}

/// One official deadline for remediating a specific non-conformity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DeadlineControlRecord {
    pub unit: String,
    /// Official-letter reference (ofício).
    pub letter_ref: String,
    pub document_links: Vec<String>,
    pub non_conformity: String,
    pub received_on: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub status: ControlStatus,
    pub notes: String,
}

impl DeadlineControlRecord {
    /// Identity used to detect duplicate imports.
    pub fn key(&self) -> ControlKey {
        ControlKey {
            letter_ref: self.letter_ref.trim().to_string(),
            unit: self.unit.trim().to_string(),
            non_conformity: self.non_conformity.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlKey {
    pub letter_ref: String,
    pub unit: String,
    pub non_conformity: String,
}

/// Both record collections as handed over by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Dataset {
    pub inspections: Vec<InspectionRecord>,
    pub deadlines: Vec<DeadlineControlRecord>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.inspections.is_empty() && self.deadlines.is_empty()
    }
}

/// Errors raised at the fallible edges (import, configuration).
#[derive(Debug, thiserror::Error)]
pub enum ComplianceError {
    #[error("input is missing the minimum required data")]
    MissingData,
    #[error("could not read input: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remediation_deadline_prefers_explicit_end() {
        let record = InspectionRecord {
            remediation_start: NaiveDate::from_ymd_opt(2024, 3, 1),
            allotted_days: Some(30),
            remediation_end: NaiveDate::from_ymd_opt(2024, 3, 10),
            ..InspectionRecord::default()
        };
        assert_eq!(record.remediation_deadline(), NaiveDate::from_ymd_opt(2024, 3, 10));
    }

    #[test]
    fn remediation_deadline_from_start_and_allotted_days() {
        let record = InspectionRecord {
            remediation_start: NaiveDate::from_ymd_opt(2024, 3, 1),
            allotted_days: Some(30),
            ..InspectionRecord::default()
        };
        assert_eq!(record.remediation_deadline(), NaiveDate::from_ymd_opt(2024, 3, 31));

        let no_days = InspectionRecord {
            remediation_start: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..InspectionRecord::default()
        };
        assert_eq!(no_days.remediation_deadline(), None);
    }

    #[test]
    fn keys_ignore_surrounding_whitespace() {
        let a = DeadlineControlRecord {
            unit: "1ª DT ".to_string(),
            letter_ref: "Of. 12/2024".to_string(),
            non_conformity: "Extintor vencido".to_string(),
            ..DeadlineControlRecord::default()
        };
        let b = DeadlineControlRecord {
            unit: "1ª DT".to_string(),
            letter_ref: " Of. 12/2024".to_string(),
            non_conformity: "Extintor vencido".to_string(),
            notes: "different notes".to_string(),
            ..DeadlineControlRecord::default()
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn config_validation() {
        assert!(DashboardConfig::default().validate().is_ok());
        let bad = DashboardConfig {
            page_size: 0,
            ..DashboardConfig::default()
        };
        assert!(matches!(bad.validate(), Err(ComplianceError::InvalidConfig(_))));
    }
}
