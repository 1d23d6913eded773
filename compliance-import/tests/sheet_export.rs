use std::fs;

use chrono::NaiveDate;
use compliance_core::{build_snapshot, DashboardConfig, StatusCategory};
use compliance_import::{load_dataset_str, Collection, DuplicatePolicy};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn load_fixture() -> compliance_import::ImportOutcome {
    let export = fs::read_to_string(fixture_path("sheet_export.json"))
        .expect("could not read sample export");
    load_dataset_str(&export, DuplicatePolicy::Reject).expect("could not import sample export")
}

#[test]
fn sheet_export_matches_golden_dataset() {
    let outcome = load_fixture();
    let actual = serde_json::to_value(&outcome.dataset).expect("could not serialize dataset");

    let expected = fs::read_to_string(fixture_path("sheet_export_dataset.json"))
        .expect("could not read golden dataset");
    let expected: Value =
        serde_json::from_str(&expected).expect("golden dataset is not valid JSON");

    assert_eq!(actual, expected);
}

#[test]
fn sheet_export_report() {
    let report = load_fixture().report;
    assert_eq!(report.inspection_rows, 4);
    assert_eq!(report.deadline_rows, 3);
    assert_eq!(report.unreadable_dates, 1);

    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.duplicates[0].collection, Collection::Inspections);
    assert_eq!((report.duplicates[0].row, report.duplicates[0].first_row), (3, 1));

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].collection, Collection::Deadlines);
    assert_eq!(report.skipped[0].row, 2);
}

#[test]
fn sheet_export_snapshot() {
    let dataset = load_fixture().dataset;
    let today = NaiveDate::from_ymd_opt(2024, 4, 25).expect("valid date");
    let snapshot = build_snapshot(&dataset, today, &DashboardConfig::default());

    assert_eq!(
        snapshot.units,
        vec!["2ª DT", "10ª DT", "DRFRV - Feira de Santana"]
    );

    let count = |groups: &[compliance_core::GroupCount<StatusCategory>], key| {
        groups
            .iter()
            .find(|group| group.key == key)
            .map_or(0, |group| group.count)
    };
    assert_eq!(count(&snapshot.deadline_status, StatusCategory::NearDue), 1);
    assert_eq!(count(&snapshot.deadline_status, StatusCategory::Regularized), 1);
    assert_eq!(count(&snapshot.inspection_status, StatusCategory::Regularized), 1);
    assert_eq!(count(&snapshot.inspection_status, StatusCategory::NearDue), 1);
    assert_eq!(count(&snapshot.inspection_status, StatusCategory::Undefined), 1);

    assert_eq!(snapshot.deadlines[0].record.letter_ref, "Of. 101/2024");
    assert_eq!(snapshot.deadlines[0].remaining_days, 5);
    assert_eq!(snapshot.deadlines[0].deadline_label, "30/04/2024");

    let months: Vec<String> = snapshot
        .inspections_by_month
        .iter()
        .map(|group| group.key.map(|key| key.label()).unwrap_or_default())
        .collect();
    assert_eq!(months, vec!["jan/2024", "fev/2024", "mar/2024"]);

    let departments: Vec<(&str, usize)> = snapshot
        .inspections_by_department
        .iter()
        .map(|group| (group.key.as_str(), group.count))
        .collect();
    assert_eq!(departments, vec![("DEPIN", 1), ("DEPOM", 2)]);

    let top: Vec<&str> = snapshot
        .top_non_conformities
        .iter()
        .map(|group| group.key.as_str())
        .collect();
    assert_eq!(
        top,
        vec!["Extintor vencido", "Cela superlotada", "Cadeia de custódia sem lacre"]
    );
}
