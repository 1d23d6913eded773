//! Record filtering and filter-picker option lists.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::units::{collate, compare_units};
use crate::{ComplianceError, DeadlineControlRecord, InspectionRecord};

/// Active filters. An empty value places no constraint on its field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FilterConfig {
    /// Exact unit name.
    pub unit: String,
    /// Exact stored status.
    pub status: String,
    /// Exact department code. Records without a department never match it.
    pub department: String,
    /// Case-insensitive substring of the unit name or non-conformity text.
    pub query: String,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.unit.trim().is_empty()
            && self.status.trim().is_empty()
            && self.department.trim().is_empty()
            && self.query.trim().is_empty()
    }

    pub fn matches<T: Filterable + ?Sized>(&self, record: &T) -> bool {
        let unit = self.unit.trim();
        if !unit.is_empty() && record.unit().trim() != unit {
            return false;
        }

        let status = self.status.trim();
        if !status.is_empty() && record.status_value().map(str::trim) != Some(status) {
            return false;
        }

        let department = self.department.trim();
        if !department.is_empty() && record.department().map(str::trim) != Some(department) {
            return false;
        }

        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        record
            .search_fields()
            .iter()
            .any(|text| text.to_lowercase().contains(&query))
    }
}

/// Fields a filter picker can be populated from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Unit,
    Status,
    Department,
    NonConformity,
    Criticality,
}

impl FromStr for RecordField {
    type Err = ComplianceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "unit" => Ok(RecordField::Unit),
            "status" => Ok(RecordField::Status),
            "department" => Ok(RecordField::Department),
            "non_conformity" | "nc" => Ok(RecordField::NonConformity),
            "criticality" => Ok(RecordField::Criticality),
            other => Err(ComplianceError::Parse(format!("unknown record field `{other}`"))),
        }
    }
}

/// Read access the filter engine needs from a record.
pub trait Filterable {
    fn unit(&self) -> &str;
    fn status_value(&self) -> Option<&str>;
    fn department(&self) -> Option<&str>;
    fn non_conformity(&self) -> &str;

    fn criticality(&self) -> Option<&str> {
        None
    }

    /// Texts the free-text query is matched against.
    fn search_fields(&self) -> Vec<&str>;

    fn field_value(&self, field: RecordField) -> Option<&str> {
        match field {
            RecordField::Unit => Some(self.unit()),
            RecordField::Status => self.status_value(),
            RecordField::Department => self.department(),
            RecordField::NonConformity => Some(self.non_conformity()),
            RecordField::Criticality => self.criticality(),
        }
    }
}

impl Filterable for InspectionRecord {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn status_value(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn department(&self) -> Option<&str> {
        Some(&self.department)
    }

    fn non_conformity(&self) -> &str {
        &self.nc_category
    }

    fn criticality(&self) -> Option<&str> {
        Some(&self.criticality)
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.unit.as_str(),
            self.nc_category.as_str(),
            self.nc_description.as_str(),
        ]
    }
}

impl Filterable for DeadlineControlRecord {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn status_value(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn department(&self) -> Option<&str> {
        None
    }

    fn non_conformity(&self) -> &str {
        &self.non_conformity
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.unit.as_str(), self.non_conformity.as_str()]
    }
}

/// Order-preserving subsequence of `records` accepted by `filter`.
pub fn filter_records<T: Filterable + Clone>(records: &[T], filter: &FilterConfig) -> Vec<T> {
    if filter.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| filter.matches(*record))
        .cloned()
        .collect()
}

/// Distinct non-blank values of `field`, for picker option lists.
///
/// Units follow the unit ordering; every other field uses collation.
pub fn distinct_values<T: Filterable>(records: &[T], field: RecordField) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut values: Vec<String> = records
        .iter()
        .filter_map(|record| record.field_value(field))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.to_string()))
        .map(str::to_string)
        .collect();

    match field {
        RecordField::Unit => values.sort_by(|a, b| compare_units(a, b)),
        _ => values.sort_by(|a, b| collate(a, b)),
    }
    values
}
