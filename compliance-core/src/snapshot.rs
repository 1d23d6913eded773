//! Dashboard views composed from the filter, classifier and aggregator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::aggregate::{
    aggregate_by, by_criticality, by_department, by_inspection_month, by_non_conformity, by_status,
    top_n, GroupCount,
};
use crate::dates::{days_remaining, format_localized, MonthKey};
use crate::filter::{distinct_values, filter_records, FilterConfig, RecordField};
use crate::status::{classify_status_with, StatusCategory, Trackable};
use crate::units::{compare_units, UnitKey};
use crate::{DashboardConfig, Dataset, DeadlineControlRecord, InspectionRecord};

/// A deadline control with its values derived as of one day.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeadlineRow {
    #[serde(flatten)]
    pub record: DeadlineControlRecord,
    /// Zero when the record has no deadline.
    pub remaining_days: i64,
    pub category: StatusCategory,
    pub category_label: &'static str,
    pub deadline_label: String,
}

/// Everything the main dashboard renders.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub total_inspections: usize,
    pub total_deadlines: usize,
    /// One entry per category, zeros included.
    pub deadline_status: Vec<GroupCount<StatusCategory>>,
    pub inspection_status: Vec<GroupCount<StatusCategory>>,
    pub deadlines: Vec<DeadlineRow>,
    pub top_non_conformities: Vec<GroupCount<String>>,
    pub inspections_by_department: Vec<GroupCount<UnitKey>>,
    pub inspections_by_criticality: Vec<GroupCount<String>>,
    /// Chronological; undated inspections lead under `None`.
    pub inspections_by_month: Vec<GroupCount<Option<MonthKey>>>,
    pub units: Vec<String>,
}

impl DashboardSnapshot {
    /// Rows not yet settled that need attention first.
    pub fn urgent(&self) -> impl Iterator<Item = &DeadlineRow> {
        self.deadlines.iter().filter(|row| {
            matches!(
                row.category,
                StatusCategory::Overdue | StatusCategory::NearDue
            )
        })
    }
}

/// Report for a single unit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnitReport {
    pub unit: String,
    pub as_of: NaiveDate,
    pub inspections: Vec<InspectionRecord>,
    pub deadlines: Vec<DeadlineRow>,
    pub deadline_status: Vec<GroupCount<StatusCategory>>,
    pub non_conformities: Vec<GroupCount<String>>,
    pub next_inspection_due: Option<NaiveDate>,
    pub next_inspection_label: String,
}

/// Derives display rows, most urgent first: category display order, then
/// fewest remaining days. Equal rows keep their input order.
pub fn deadline_rows(
    records: &[DeadlineControlRecord],
    today: NaiveDate,
    config: &DashboardConfig,
) -> Vec<DeadlineRow> {
    let mut rows: Vec<DeadlineRow> = records
        .iter()
        .map(|record| {
            let category = classify_status_with(record, today, config);
            DeadlineRow {
                remaining_days: days_remaining(record.deadline, today),
                category,
                category_label: category.label(),
                deadline_label: format_localized(record.deadline),
                record: record.clone(),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.remaining_days.cmp(&b.remaining_days))
    });
    rows
}

/// Counts per category over `records`, listing every category.
pub fn status_breakdown<T: Trackable>(
    records: &[T],
    today: NaiveDate,
    config: &DashboardConfig,
) -> Vec<GroupCount<StatusCategory>> {
    let counted = aggregate_by(records, by_status::<T>(today, config));
    StatusCategory::ALL
        .iter()
        .map(|category| GroupCount {
            key: *category,
            count: counted
                .iter()
                .find(|group| group.key == *category)
                .map_or(0, |group| group.count),
        })
        .collect()
}

/// Every dashboard view of `dataset` as of `today`.
pub fn build_snapshot(
    dataset: &Dataset,
    today: NaiveDate,
    config: &DashboardConfig,
) -> DashboardSnapshot {
    let mut units = distinct_values(&dataset.inspections, RecordField::Unit);
    units.extend(distinct_values(&dataset.deadlines, RecordField::Unit));
    units.sort_by(|a, b| compare_units(a, b));
    units.dedup();

    DashboardSnapshot {
        generated_at: Utc::now(),
        as_of: today,
        total_inspections: dataset.inspections.len(),
        total_deadlines: dataset.deadlines.len(),
        deadline_status: status_breakdown(&dataset.deadlines, today, config),
        inspection_status: status_breakdown(&dataset.inspections, today, config),
        deadlines: deadline_rows(&dataset.deadlines, today, config),
        top_non_conformities: top_n(&dataset.inspections, by_non_conformity, config.top_n),
        inspections_by_department: aggregate_by(&dataset.inspections, by_department),
        inspections_by_criticality: aggregate_by(&dataset.inspections, by_criticality),
        inspections_by_month: aggregate_by(&dataset.inspections, by_inspection_month),
        units,
    }
}

/// The views of a single unit; an unknown unit yields an empty report.
pub fn unit_report(
    dataset: &Dataset,
    unit: &str,
    today: NaiveDate,
    config: &DashboardConfig,
) -> UnitReport {
    let filter = FilterConfig {
        unit: unit.to_string(),
        ..FilterConfig::default()
    };
    let inspections = filter_records(&dataset.inspections, &filter);
    let deadlines = filter_records(&dataset.deadlines, &filter);
    let next_inspection_due = inspections
        .iter()
        .filter_map(|record| record.next_inspection_due)
        .min();

    UnitReport {
        unit: unit.trim().to_string(),
        as_of: today,
        deadline_status: status_breakdown(&deadlines, today, config),
        deadlines: deadline_rows(&deadlines, today, config),
        non_conformities: top_n(&inspections, by_non_conformity, config.top_n),
        next_inspection_due,
        next_inspection_label: format_localized(next_inspection_due),
        inspections,
    }
}
