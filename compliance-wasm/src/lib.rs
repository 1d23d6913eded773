//! Framework-neutral WASM <-> JavaScript bridge for the dashboard front end.
//!
//! Record arrays are tagged by `kind` (`"inspections"` or `"deadlines"`).
//! Dates travel as ISO strings; `today` is always supplied by the caller, an
//! empty string meaning the browser's local date.

use std::str::FromStr;

use chrono::NaiveDate;
use compliance_core::aggregate::{
    by_criticality, by_deadline_month, by_department, by_inspection_month, by_non_conformity,
    by_unit,
};
use compliance_core::{
    build_snapshot, classify_status_with, days_remaining, format_localized,
    local_today, parse_calendar_date, status_breakdown, top_n, ComplianceError, DashboardConfig,
    DashboardSnapshot, Dataset, DeadlineControlRecord, FilterConfig, Filterable, InspectionRecord,
    MonthKey, Page, RecordField, StatusCategory, Trackable, UnitReport, NOT_DEFINED_LABEL,
};
use compliance_import::{load_dataset_value, DuplicatePolicy, ImportReport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
struct JsDashboardConfig {
    #[serde(default)]
    near_due_days: Option<i64>,
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(default)]
    top_n: Option<usize>,
}

impl From<JsDashboardConfig> for DashboardConfig {
    fn from(cfg: JsDashboardConfig) -> Self {
        let mut base = DashboardConfig::default();
        if let Some(days) = cfg.near_due_days {
            base.near_due_days = days;
        }
        if let Some(size) = cfg.page_size {
            base.page_size = size;
        }
        if let Some(n) = cfg.top_n {
            base.top_n = n;
        }
        base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Inspections,
    Deadlines,
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inspections" | "inspection" => Ok(RecordKind::Inspections),
            "deadlines" | "deadline" => Ok(RecordKind::Deadlines),
            other => Err(format!("unknown record kind `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Records {
    Inspections(Vec<InspectionRecord>),
    Deadlines(Vec<DeadlineControlRecord>),
}

impl Records {
    fn decode(kind: RecordKind, rows: Value) -> Result<Self, String> {
        let decoded = match kind {
            RecordKind::Inspections => serde_json::from_value(rows).map(Records::Inspections),
            RecordKind::Deadlines => serde_json::from_value(rows).map(Records::Deadlines),
        };
        decoded.map_err(|err| format!("could not read records: {err}"))
    }
}

/// Grouping dimension for chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartField {
    Unit,
    Department,
    NonConformity,
    Criticality,
    Status,
    Month,
}

impl FromStr for ChartField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "unit" => Ok(ChartField::Unit),
            "department" => Ok(ChartField::Department),
            "non_conformity" | "nc" => Ok(ChartField::NonConformity),
            "criticality" => Ok(ChartField::Criticality),
            "status" => Ok(ChartField::Status),
            "month" => Ok(ChartField::Month),
            other => Err(format!("unknown chart field `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct ChartPoint {
    key: String,
    label: String,
    count: usize,
}

impl ChartPoint {
    fn named(key: String, count: usize) -> Self {
        let label = if key.is_empty() {
            NOT_DEFINED_LABEL.to_string()
        } else {
            key.clone()
        };
        Self { key, label, count }
    }

    /// Undated records get an empty key, like blank text fields.
    fn month(key: Option<MonthKey>, count: usize) -> Self {
        match key {
            Some(key) => Self {
                key: format!("{:04}-{:02}", key.year, key.month),
                label: key.label(),
                count,
            },
            None => Self::named(String::new(), count),
        }
    }

    fn status(key: StatusCategory, count: usize) -> Self {
        Self {
            key: key.as_str().to_string(),
            label: key.label().to_string(),
            count,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct StatusView {
    category: StatusCategory,
    label: &'static str,
    /// Settled by an explicit status rather than by the calendar.
    terminal: bool,
    remaining_days: i64,
    deadline_label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct PageView<'a> {
    #[serde(flatten)]
    page: Page<'a, Value>,
    window: Vec<usize>,
    has_previous: bool,
    has_next: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct DatasetSummary {
    snapshot: DashboardSnapshot,
    report: ImportReport,
}

fn chart_points<T, M>(
    records: &[T],
    field: ChartField,
    today: NaiveDate,
    config: &DashboardConfig,
    month_of: M,
) -> Vec<ChartPoint>
where
    T: Filterable + Trackable,
    M: Fn(&T) -> Option<MonthKey>,
{
    match field {
        ChartField::Unit => compliance_core::aggregate_by(records, by_unit)
            .into_iter()
            .map(|group| ChartPoint::named(group.key.0, group.count))
            .collect(),
        ChartField::Department => compliance_core::aggregate_by(records, by_department)
            .into_iter()
            .map(|group| ChartPoint::named(group.key.0, group.count))
            .collect(),
        ChartField::NonConformity => compliance_core::aggregate_by(records, by_non_conformity)
            .into_iter()
            .map(|group| ChartPoint::named(group.key, group.count))
            .collect(),
        ChartField::Criticality => compliance_core::aggregate_by(records, by_criticality)
            .into_iter()
            .map(|group| ChartPoint::named(group.key, group.count))
            .collect(),
        ChartField::Status => status_breakdown(records, today, config)
            .into_iter()
            .map(|group| ChartPoint::status(group.key, group.count))
            .collect(),
        ChartField::Month => compliance_core::aggregate_by(records, month_of)
            .into_iter()
            .map(|group| ChartPoint::month(group.key, group.count))
            .collect(),
    }
}

fn chart(
    records: &Records,
    field: ChartField,
    today: NaiveDate,
    config: &DashboardConfig,
) -> Vec<ChartPoint> {
    match records {
        Records::Inspections(rows) => chart_points(rows, field, today, config, by_inspection_month),
        Records::Deadlines(rows) => chart_points(rows, field, today, config, by_deadline_month),
    }
}

/// Most frequent values of a text field; ties keep first-seen order.
fn ranking<T: Filterable>(
    records: &[T],
    field: ChartField,
    limit: usize,
) -> Result<Vec<ChartPoint>, String> {
    let groups = match field {
        ChartField::Unit => top_n(records, |record: &T| by_unit(record).0, limit),
        ChartField::Department => top_n(records, |record: &T| by_department(record).0, limit),
        ChartField::NonConformity => top_n(records, by_non_conformity, limit),
        ChartField::Criticality => top_n(records, by_criticality, limit),
        ChartField::Status | ChartField::Month => {
            return Err(format!("{field:?} cannot be ranked"));
        }
    };
    Ok(groups
        .into_iter()
        .map(|group| ChartPoint::named(group.key, group.count))
        .collect())
}

fn status_view<T: Trackable>(record: &T, today: NaiveDate, config: &DashboardConfig) -> StatusView {
    let category = classify_status_with(record, today, config);
    let deadline = record.deadline();
    StatusView {
        category,
        label: category.label(),
        terminal: category.is_terminal(),
        remaining_days: days_remaining(deadline, today),
        deadline_label: format_localized(deadline),
    }
}

fn page_view(items: &[Value], page: usize, page_size: usize) -> PageView<'_> {
    let page = compliance_core::paginate(items, page, page_size);
    PageView {
        window: page.window(),
        has_previous: page.has_previous(),
        has_next: page.has_next(),
        page,
    }
}

fn summarize(
    export: &Value,
    today: NaiveDate,
    config: &DashboardConfig,
) -> Result<DatasetSummary, ComplianceError> {
    let outcome = load_dataset_value(export, DuplicatePolicy::Reject)?;
    Ok(DatasetSummary {
        snapshot: build_snapshot(&outcome.dataset, today, config),
        report: outcome.report,
    })
}

fn parse_today(raw: &str) -> Result<NaiveDate, String> {
    if raw.trim().is_empty() {
        return Ok(local_today());
    }
    parse_calendar_date(raw).ok_or_else(|| format!("could not read today's date `{raw}`"))
}

fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn decode<T: DeserializeOwned>(value: JsValue, what: &str) -> Result<T, JsValue> {
    from_value(value).map_err(|err| JsValue::from_str(&format!("could not read {what}: {err}")))
}

fn encode<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("could not serialize result: {err}")))
}

fn decode_records(kind: &str, records: JsValue) -> Result<Records, JsValue> {
    let kind = RecordKind::from_str(kind).map_err(js_error)?;
    let rows: Value = decode(records, "records")?;
    Records::decode(kind, rows).map_err(js_error)
}

fn decode_config(config: Option<JsValue>) -> Result<DashboardConfig, JsValue> {
    let cfg = match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            DashboardConfig::from(decode::<JsDashboardConfig>(js_cfg, "config")?)
        }
        _ => DashboardConfig::default(),
    };
    cfg.validate().map_err(js_error)?;
    Ok(cfg)
}

#[wasm_bindgen]
pub fn filter_records(
    kind: &str,
    records: JsValue,
    filter: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let records = decode_records(kind, records)?;
    let filter: FilterConfig = match filter {
        Some(js_filter) if !js_filter.is_undefined() && !js_filter.is_null() => {
            decode(js_filter, "filter")?
        }
        _ => FilterConfig::default(),
    };
    match records {
        Records::Inspections(rows) => encode(&compliance_core::filter_records(&rows, &filter)),
        Records::Deadlines(rows) => encode(&compliance_core::filter_records(&rows, &filter)),
    }
}

#[wasm_bindgen]
pub fn classify_status(
    kind: &str,
    record: JsValue,
    today: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let kind = RecordKind::from_str(kind).map_err(js_error)?;
    let today = parse_today(today).map_err(js_error)?;
    let cfg = decode_config(config)?;
    match kind {
        RecordKind::Inspections => {
            let record: InspectionRecord = decode(record, "inspection")?;
            encode(&status_view(&record, today, &cfg))
        }
        RecordKind::Deadlines => {
            let record: DeadlineControlRecord = decode(record, "deadline control")?;
            encode(&status_view(&record, today, &cfg))
        }
    }
}

#[wasm_bindgen]
pub fn sort_units(names: JsValue) -> Result<JsValue, JsValue> {
    init();
    let names: Vec<String> = decode(names, "unit names")?;
    encode(&compliance_core::sort_units(names))
}

#[wasm_bindgen]
pub fn paginate(items: JsValue, page: u32, page_size: u32) -> Result<JsValue, JsValue> {
    init();
    let items: Vec<Value> = decode(items, "items")?;
    encode(&page_view(&items, page as usize, page_size as usize))
}

#[wasm_bindgen]
pub fn page_window(current_page: u32, total_pages: u32) -> Vec<u32> {
    compliance_core::page_window(current_page as usize, total_pages as usize)
        .into_iter()
        .map(|page| page as u32)
        .collect()
}

/// Chart series for `field`: unit, department, non_conformity, criticality,
/// status or month.
#[wasm_bindgen]
pub fn aggregate_by(
    kind: &str,
    records: JsValue,
    field: &str,
    today: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let records = decode_records(kind, records)?;
    let field = ChartField::from_str(field).map_err(js_error)?;
    let today = parse_today(today).map_err(js_error)?;
    let cfg = decode_config(config)?;
    encode(&chart(&records, field, today, &cfg))
}

#[wasm_bindgen]
pub fn top_values(
    kind: &str,
    records: JsValue,
    field: &str,
    limit: u32,
) -> Result<JsValue, JsValue> {
    init();
    let records = decode_records(kind, records)?;
    let field = ChartField::from_str(field).map_err(js_error)?;
    let points = match &records {
        Records::Inspections(rows) => ranking(rows, field, limit as usize),
        Records::Deadlines(rows) => ranking(rows, field, limit as usize),
    }
    .map_err(js_error)?;
    encode(&points)
}

#[wasm_bindgen]
pub fn distinct_values(kind: &str, records: JsValue, field: &str) -> Result<JsValue, JsValue> {
    init();
    let records = decode_records(kind, records)?;
    let field = RecordField::from_str(field).map_err(js_error)?;
    match records {
        Records::Inspections(rows) => encode(&compliance_core::distinct_values(&rows, field)),
        Records::Deadlines(rows) => encode(&compliance_core::distinct_values(&rows, field)),
    }
}

/// Imports a spreadsheet export and builds the dashboard snapshot with the
/// import report alongside.
#[wasm_bindgen]
pub fn summarize_dataset(
    export: JsValue,
    today: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let export: Value = decode(export, "dataset")?;
    let today = parse_today(today).map_err(js_error)?;
    let cfg = decode_config(config)?;
    let summary = summarize(&export, today, &cfg)
        .map_err(|err| JsValue::from_str(&format!("Compliance error: {err}")))?;
    encode(&summary)
}

#[wasm_bindgen]
pub fn unit_report(
    dataset: JsValue,
    unit: &str,
    today: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let dataset: Dataset = decode(dataset, "dataset")?;
    let today = parse_today(today).map_err(js_error)?;
    let cfg = decode_config(config)?;
    let report: UnitReport = compliance_core::unit_report(&dataset, unit, today, &cfg);
    encode(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_core::ControlStatus;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn control(
        unit: &str,
        deadline: Option<NaiveDate>,
        status: ControlStatus,
    ) -> DeadlineControlRecord {
        DeadlineControlRecord {
            unit: unit.to_string(),
            non_conformity: "Extintor vencido".to_string(),
            deadline,
            status,
            ..DeadlineControlRecord::default()
        }
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let js: JsDashboardConfig = serde_json::from_value(json!({ "near_due_days": 3 })).unwrap();
        let cfg = DashboardConfig::from(js);
        assert_eq!(cfg.near_due_days, 3);
        assert_eq!(cfg.page_size, DashboardConfig::default().page_size);
        assert_eq!(cfg.top_n, DashboardConfig::default().top_n);
    }

    #[test]
    fn record_kind_and_field_names() {
        assert_eq!("Deadlines".parse::<RecordKind>(), Ok(RecordKind::Deadlines));
        assert!("prazos".parse::<RecordKind>().is_err());
        assert_eq!("non-conformity".parse::<ChartField>(), Ok(ChartField::NonConformity));
        assert!("officer".parse::<ChartField>().is_err());
    }

    #[test]
    fn records_decode_by_kind() {
        let rows = json!([{ "unit": "4ª DT", "deadline": "2024-05-02", "status": "regularized" }]);
        let Records::Deadlines(decoded) = Records::decode(RecordKind::Deadlines, rows).unwrap()
        else {
            panic!("expected deadline records");
        };
        assert_eq!(decoded[0].status, ControlStatus::Regularized);
        assert_eq!(decoded[0].deadline, Some(ymd(2024, 5, 2)));

        let bad = json!([{ "unit": "4ª DT", "deadline": "amanhã" }]);
        assert!(Records::decode(RecordKind::Deadlines, bad).is_err());
    }

    #[test]
    fn status_chart_lists_every_category() {
        let today = ymd(2024, 5, 1);
        let records = Records::Deadlines(vec![
            control("1ª DT", Some(ymd(2024, 5, 3)), ControlStatus::Pending),
            control("1ª DT", Some(ymd(2024, 4, 1)), ControlStatus::Regularized),
            control("2ª DT", None, ControlStatus::Pending),
        ]);
        let points = chart(&records, ChartField::Status, today, &DashboardConfig::default());
        assert_eq!(points.len(), StatusCategory::ALL.len());
        let near_due = points.iter().find(|point| point.key == "near_due").unwrap();
        assert_eq!(near_due.count, 1);
        assert_eq!(near_due.label, "Próximo do vencimento");
        assert_eq!(points.iter().map(|point| point.count).sum::<usize>(), 3);
    }

    #[test]
    fn month_chart_keeps_undated_records() {
        let records = Records::Deadlines(vec![
            control("1ª DT", Some(ymd(2024, 3, 3)), ControlStatus::Pending),
            control("1ª DT", Some(ymd(2024, 3, 30)), ControlStatus::Pending),
            control("2ª DT", None, ControlStatus::Pending),
        ]);
        let points = chart(
            &records,
            ChartField::Month,
            ymd(2024, 5, 1),
            &DashboardConfig::default(),
        );
        assert_eq!(
            points,
            vec![
                ChartPoint {
                    key: String::new(),
                    label: NOT_DEFINED_LABEL.to_string(),
                    count: 1,
                },
                ChartPoint {
                    key: "2024-03".to_string(),
                    label: "mar/2024".to_string(),
                    count: 2,
                },
            ]
        );
    }

    #[test]
    fn every_chart_field_counts_every_record() {
        let fields = [
            ChartField::Unit,
            ChartField::Department,
            ChartField::NonConformity,
            ChartField::Criticality,
            ChartField::Status,
            ChartField::Month,
        ];
        let deadlines = Records::Deadlines(vec![
            control("1ª DT", Some(ymd(2024, 3, 3)), ControlStatus::Pending),
            control("", None, ControlStatus::Regularized),
            control("2ª DT", None, ControlStatus::Pending),
        ]);
        let inspections = Records::Inspections(vec![
            InspectionRecord {
                unit: "1ª DT".to_string(),
                department: "DEPOM".to_string(),
                inspected_on: Some(ymd(2024, 2, 1)),
                criticality: "Alta".to_string(),
                ..InspectionRecord::default()
            },
            InspectionRecord::default(),
        ]);
        for (records, len) in [(&deadlines, 3), (&inspections, 2)] {
            for field in fields {
                let points = chart(records, field, ymd(2024, 5, 1), &DashboardConfig::default());
                let total: usize = points.iter().map(|point| point.count).sum();
                assert_eq!(total, len, "{field:?}");
            }
        }
    }

    #[test]
    fn unit_chart_follows_unit_order_and_labels_blanks() {
        let records = Records::Deadlines(vec![
            control("10ª DT", None, ControlStatus::Pending),
            control("2ª DT", None, ControlStatus::Pending),
            control("", None, ControlStatus::Pending),
        ]);
        let points = chart(
            &records,
            ChartField::Unit,
            ymd(2024, 5, 1),
            &DashboardConfig::default(),
        );
        let labels: Vec<&str> = points.iter().map(|point| point.label.as_str()).collect();
        assert_eq!(labels, vec![NOT_DEFINED_LABEL, "2ª DT", "10ª DT"]);
    }

    #[test]
    fn ranking_keeps_first_seen_order_on_ties() {
        let rows = vec![
            control("3ª DT", None, ControlStatus::Pending),
            control("1ª DT", None, ControlStatus::Pending),
            control("1ª DT", None, ControlStatus::Pending),
            control("3ª DT", None, ControlStatus::Pending),
            control("2ª DT", None, ControlStatus::Pending),
        ];
        let top = ranking(&rows, ChartField::Unit, 2).unwrap();
        let keys: Vec<&str> = top.iter().map(|point| point.key.as_str()).collect();
        assert_eq!(keys, vec!["3ª DT", "1ª DT"]);
        assert!(ranking(&rows, ChartField::Status, 2).is_err());
    }

    #[test]
    fn status_view_reports_remaining_days() {
        let record = control("1ª DT", Some(ymd(2024, 5, 3)), ControlStatus::Pending);
        let view = status_view(&record, ymd(2024, 5, 1), &DashboardConfig::default());
        assert_eq!(view.category, StatusCategory::NearDue);
        assert!(!view.terminal);

        let settled = control("1ª DT", Some(ymd(2024, 4, 1)), ControlStatus::Regularized);
        let view = status_view(&settled, ymd(2024, 5, 1), &DashboardConfig::default());
        assert_eq!(view.category, StatusCategory::Regularized);
        assert!(view.terminal);
        assert_eq!(view.remaining_days, 2);
        assert_eq!(view.deadline_label, "03/05/2024");

        let undated = control("1ª DT", None, ControlStatus::Pending);
        let view = status_view(&undated, ymd(2024, 5, 1), &DashboardConfig::default());
        assert_eq!(view.category, StatusCategory::Undefined);
        assert_eq!(view.deadline_label, NOT_DEFINED_LABEL);
    }

    #[test]
    fn page_view_clamps_and_windows() {
        let items: Vec<Value> = (0..23).map(|n| json!({ "n": n })).collect();
        let view = page_view(&items, 9, 10);
        assert_eq!(view.page.current_page, 3);
        assert_eq!(view.page.items.len(), 3);
        assert_eq!(view.window, vec![1, 2, 3]);
        assert!(view.has_previous);
        assert!(!view.has_next);
    }

    #[test]
    fn summarize_imports_then_snapshots() {
        let export = json!({
            "Inspeções": [
                { "Unidade": "2ª DT", "Não conformidade": "Extintor vencido", "Data": 45366 }
            ],
            "Prazos": [
                {
                    "Unidade": "2ª DT",
                    "Ofício": "Of. 7/2024",
                    "Não conformidade": "Extintor vencido",
                    "Prazo": "2024-03-20"
                }
            ]
        });
        let summary = summarize(&export, ymd(2024, 3, 25), &DashboardConfig::default()).unwrap();
        assert_eq!(summary.snapshot.total_inspections, 1);
        assert_eq!(summary.snapshot.total_deadlines, 1);
        assert_eq!(summary.snapshot.deadlines[0].category, StatusCategory::Overdue);
        assert!(summary.report.is_clean());

        assert!(matches!(
            summarize(&json!({ "other": [] }), ymd(2024, 3, 25), &DashboardConfig::default()),
            Err(ComplianceError::MissingData)
        ));
    }

    #[test]
    fn today_parsing() {
        assert_eq!(parse_today("2024-03-15"), Ok(ymd(2024, 3, 15)));
        assert_eq!(parse_today("15/03/2024"), Ok(ymd(2024, 3, 15)));
        assert!(parse_today("ontem").is_err());
        assert!(parse_today("2024").is_err());
    }
}
