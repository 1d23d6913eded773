//! Spreadsheet-export JSON to typed `Dataset` converter.
//!
//! The Excel-to-JSON scripts emit one object per sheet row. Column names
//! drift between sheets (`"Unidade"`, `"UNIDADE"`, `"unidade inspecionada"`),
//! dates arrive either as spreadsheet serials or as text, and the same finding
//! is sometimes exported twice. Everything is normalized here, once, so the
//! core never has to look at raw rows.

use std::collections::{hash_map::Entry, HashMap};
use std::hash::Hash;

use chrono::NaiveDate;
use compliance_core::text::fold_token;
use compliance_core::{
    excel_serial_to_date, parse_calendar_date, ComplianceError, ControlStatus, Dataset,
    DeadlineControlRecord, ExplicitStatus, InspectionRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// What to do when a row repeats the identity of an earlier one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first row and report the repeat.
    #[default]
    Reject,
    /// Replace the earlier row in place with the later one.
    Merge,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Inspections,
    Deadlines,
}

/// A row that could not be turned into a record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowIssue {
    pub collection: Collection,
    /// Zero-based row index in the source array.
    pub row: usize,
    pub reason: String,
}

/// A row whose identity repeated an earlier row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DuplicateRow {
    pub collection: Collection,
    pub row: usize,
    pub first_row: usize,
    pub merged: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub inspection_rows: usize,
    pub deadline_rows: usize,
    pub skipped: Vec<RowIssue>,
    pub duplicates: Vec<DuplicateRow>,
    /// Date cells that were present but unreadable, stored as `None`.
    pub unreadable_dates: usize,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.duplicates.is_empty() && self.unreadable_dates == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub dataset: Dataset,
    pub report: ImportReport,
}

const INSPECTIONS_KEYS: [&str; 4] = ["inspections", "inspecoes", "fiscalizacoes", "registros"];
const DEADLINES_KEYS: [&str; 4] = ["deadlines", "prazos", "controle_de_prazos", "controle_prazos"];

mod columns {
    pub const NUMBER: &[&str] = &["number", "numero", "nº", "n", "no", "id"];
    pub const UNIT: &[&str] = &["unit", "unidade", "unidade_inspecionada", "delegacia"];
    pub const DEPARTMENT: &[&str] = &["department", "departamento", "dpto", "coordenacao"];
    pub const INSPECTED_ON: &[&str] = &[
        "inspected_on",
        "data_inspecao",
        "data_da_inspecao",
        "data_fiscalizacao",
        "data",
    ];
    pub const OFFICER: &[&str] = &[
        "responsible_officer",
        "responsavel",
        "delegado_responsavel",
        "titular",
    ];
    pub const NC_CATEGORY: &[&str] = &["nc_category", "nao_conformidade", "categoria", "nc"];
    pub const NC_DESCRIPTION: &[&str] = &[
        "nc_description",
        "descricao",
        "descricao_da_nao_conformidade",
        "detalhamento",
    ];
    pub const INITIAL_STAGE: &[&str] = &["initial_stage", "fase_inicial", "providencia_inicial"];
    pub const INTERMEDIATE_STAGE: &[&str] = &[
        "intermediate_stage",
        "fase_intermediaria",
        "providencia_intermediaria",
    ];
    pub const CONCLUSIVE_STAGE: &[&str] = &[
        "conclusive_stage",
        "fase_conclusiva",
        "providencia_conclusiva",
    ];
    pub const REMEDIATION_START: &[&str] = &[
        "remediation_start",
        "inicio_regularizacao",
        "inicio_da_regularizacao",
        "data_inicio",
    ];
    pub const ALLOTTED_DAYS: &[&str] = &["allotted_days", "prazo_dias", "prazo_em_dias", "dias"];
    pub const REMEDIATION_END: &[&str] = &[
        "remediation_end",
        "fim_regularizacao",
        "fim_da_regularizacao",
        "data_fim",
    ];
    pub const STATUS: &[&str] = &["status", "situacao"];
    pub const NEXT_INSPECTION: &[&str] = &[
        "next_inspection_due",
        "proxima_inspecao",
        "proxima_fiscalizacao",
    ];
    pub const CRITICALITY: &[&str] = &["criticality", "criticidade", "gravidade"];

    pub const LETTER_REF: &[&str] = &[
        "letter_ref",
        "oficio",
        "n_oficio",
        "numero_oficio",
        "numero_do_oficio",
    ];
    pub const LINKS: &[&str] = &["document_links", "links", "documentos", "anexos"];
    pub const NON_CONFORMITY: &[&str] = &["non_conformity", "nao_conformidade", "nc"];
    pub const RECEIVED_ON: &[&str] = &["received_on", "data_recebimento", "recebido_em"];
    pub const DEADLINE: &[&str] = &["deadline", "prazo", "data_limite", "prazo_final"];
    pub const NOTES: &[&str] = &["notes", "observacoes", "observacao", "obs"];
}

/// Import a dataset from a JSON string.
pub fn load_dataset_str(
    json: &str,
    policy: DuplicatePolicy,
) -> Result<ImportOutcome, ComplianceError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| ComplianceError::Parse(err.to_string()))?;
    load_dataset_value(&value, policy)
}

/// Import a dataset from an object holding an inspections array, a deadlines
/// array, or both.
pub fn load_dataset_value(
    value: &Value,
    policy: DuplicatePolicy,
) -> Result<ImportOutcome, ComplianceError> {
    let object = value.as_object().ok_or_else(|| {
        ComplianceError::Parse("expected a JSON object with inspections and/or deadlines".into())
    })?;

    let mut inspections = None;
    let mut deadlines = None;
    for (key, section) in object {
        let folded = fold_token(key);
        if INSPECTIONS_KEYS.contains(&folded.as_str()) {
            inspections = Some(section);
        } else if DEADLINES_KEYS.contains(&folded.as_str()) {
            deadlines = Some(section);
        } else {
            debug!(section = %key, "ignoring unknown top-level section");
        }
    }

    if inspections.is_none() && deadlines.is_none() {
        return Err(ComplianceError::MissingData);
    }

    let mut importer = Importer::new(policy);
    if let Some(section) = inspections {
        importer.inspections(section)?;
    }
    if let Some(section) = deadlines {
        importer.deadlines(section)?;
    }
    Ok(importer.finish())
}

/// Import a bare array of inspection rows.
pub fn load_inspections_value(
    rows: &Value,
    policy: DuplicatePolicy,
) -> Result<ImportOutcome, ComplianceError> {
    let mut importer = Importer::new(policy);
    importer.inspections(rows)?;
    Ok(importer.finish())
}

/// Import a bare array of deadline-control rows.
pub fn load_deadlines_value(
    rows: &Value,
    policy: DuplicatePolicy,
) -> Result<ImportOutcome, ComplianceError> {
    let mut importer = Importer::new(policy);
    importer.deadlines(rows)?;
    Ok(importer.finish())
}

struct Importer {
    policy: DuplicatePolicy,
    inspections: Unique<compliance_core::InspectionKey, InspectionRecord>,
    deadlines: Unique<compliance_core::ControlKey, DeadlineControlRecord>,
    report: ImportReport,
}

impl Importer {
    fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            inspections: Unique::default(),
            deadlines: Unique::default(),
            report: ImportReport::default(),
        }
    }

    fn inspections(&mut self, section: &Value) -> Result<(), ComplianceError> {
        let rows = section_rows(section, "inspections")?;
        self.report.inspection_rows += rows.len();

        for (index, raw) in rows.iter().enumerate() {
            let Some(row) = Row::new(raw) else {
                self.skip(Collection::Inspections, index, "row is not an object");
                continue;
            };
            match row.inspection() {
                Ok((record, unreadable)) => {
                    self.report.unreadable_dates += unreadable;
                    let key = record.key();
                    let repeated = self.inspections.insert(key, record, index, self.policy);
                    if let Some(first_row) = repeated {
                        self.duplicate(Collection::Inspections, index, first_row);
                    }
                }
                Err(reason) => self.skip(Collection::Inspections, index, reason),
            }
        }
        Ok(())
    }

    fn deadlines(&mut self, section: &Value) -> Result<(), ComplianceError> {
        let rows = section_rows(section, "deadlines")?;
        self.report.deadline_rows += rows.len();

        for (index, raw) in rows.iter().enumerate() {
            let Some(row) = Row::new(raw) else {
                self.skip(Collection::Deadlines, index, "row is not an object");
                continue;
            };
            match row.deadline_control() {
                Ok((record, unreadable)) => {
                    self.report.unreadable_dates += unreadable;
                    let key = record.key();
                    let repeated = self.deadlines.insert(key, record, index, self.policy);
                    if let Some(first_row) = repeated {
                        self.duplicate(Collection::Deadlines, index, first_row);
                    }
                }
                Err(reason) => self.skip(Collection::Deadlines, index, reason),
            }
        }
        Ok(())
    }

    fn skip(&mut self, collection: Collection, row: usize, reason: &str) {
        warn!(?collection, row, reason, "skipping row");
        self.report.skipped.push(RowIssue {
            collection,
            row,
            reason: reason.to_string(),
        });
    }

    fn duplicate(&mut self, collection: Collection, row: usize, first_row: usize) {
        let merged = self.policy == DuplicatePolicy::Merge;
        warn!(?collection, row, first_row, merged, "duplicate record identity");
        self.report.duplicates.push(DuplicateRow {
            collection,
            row,
            first_row,
            merged,
        });
    }

    fn finish(self) -> ImportOutcome {
        let dataset = Dataset {
            inspections: self.inspections.into_records(),
            deadlines: self.deadlines.into_records(),
        };
        info!(
            inspections = dataset.inspections.len(),
            deadlines = dataset.deadlines.len(),
            skipped = self.report.skipped.len(),
            duplicates = self.report.duplicates.len(),
            "import finished"
        );
        ImportOutcome {
            dataset,
            report: self.report,
        }
    }
}

fn section_rows<'a>(section: &'a Value, name: &str) -> Result<&'a Vec<Value>, ComplianceError> {
    section
        .as_array()
        .ok_or_else(|| ComplianceError::Parse(format!("section `{name}` must be an array")))
}

/// Records in first-seen order, unique by key.
struct Unique<K, R> {
    positions: HashMap<K, (usize, usize)>,
    records: Vec<R>,
}

impl<K, R> Default for Unique<K, R> {
    fn default() -> Self {
        Self {
            positions: HashMap::new(),
            records: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, R> Unique<K, R> {
    /// Returns the source row of the earlier record when `key` repeats.
    fn insert(&mut self, key: K, record: R, row: usize, policy: DuplicatePolicy) -> Option<usize> {
        match self.positions.entry(key) {
            Entry::Occupied(slot) => {
                let (position, first_row) = *slot.get();
                if policy == DuplicatePolicy::Merge {
                    self.records[position] = record;
                }
                Some(first_row)
            }
            Entry::Vacant(slot) => {
                slot.insert((self.records.len(), row));
                self.records.push(record);
                None
            }
        }
    }

    fn into_records(self) -> Vec<R> {
        self.records
    }
}

/// One sheet row with folded column names.
struct Row<'a> {
    cells: HashMap<String, &'a Value>,
}

impl<'a> Row<'a> {
    fn new(raw: &'a Value) -> Option<Self> {
        let object = raw.as_object()?;
        let cells = object
            .iter()
            .map(|(key, value)| (fold_token(key), value))
            .collect();
        Some(Self { cells })
    }

    fn cell(&self, aliases: &[&str]) -> Option<&'a Value> {
        aliases
            .iter()
            .filter_map(|alias| self.cells.get(*alias).copied())
            .find(|value| !is_blank(value))
    }

    fn text(&self, aliases: &[&str]) -> String {
        self.cell(aliases).and_then(cell_text).unwrap_or_default()
    }

    fn optional_text(&self, aliases: &[&str]) -> Option<String> {
        self.cell(aliases).and_then(cell_text)
    }

    /// `Ok(None)` for an empty cell, `Err(())` for a present but unreadable one.
    fn date(&self, aliases: &[&str]) -> Result<Option<NaiveDate>, ()> {
        let Some(value) = self.cell(aliases) else {
            return Ok(None);
        };
        match cell_date(value) {
            Some(date) => Ok(Some(date)),
            None => {
                warn!(column = aliases[0], value = %value, "unreadable date cell");
                Err(())
            }
        }
    }

    fn days(&self, aliases: &[&str]) -> Option<u32> {
        self.cell(aliases).and_then(cell_days)
    }

    fn links(&self, aliases: &[&str]) -> Vec<String> {
        match self.cell(aliases) {
            Some(Value::Array(items)) => items.iter().filter_map(cell_text).collect(),
            Some(Value::String(text)) => text
                .split(|c: char| c.is_whitespace() || c == ';' || c == ',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn inspection(&self) -> Result<(InspectionRecord, usize), &'static str> {
        let unit = self.text(columns::UNIT);
        if unit.is_empty() {
            return Err("missing unit");
        }
        let nc_description = self.text(columns::NC_DESCRIPTION);
        let mut nc_category = self.text(columns::NC_CATEGORY);
        if nc_category.is_empty() {
            if nc_description.is_empty() {
                return Err("missing non-conformity");
            }
            nc_category = nc_description.clone();
        }

        let mut unreadable = 0;
        let mut date = |aliases: &[&str]| {
            self.date(aliases).unwrap_or_else(|()| {
                unreadable += 1;
                None
            })
        };
        let inspected_on = date(columns::INSPECTED_ON);
        let remediation_start = date(columns::REMEDIATION_START);
        let remediation_end = date(columns::REMEDIATION_END);
        let next_inspection_due = date(columns::NEXT_INSPECTION);

        let record = InspectionRecord {
            number: self.text(columns::NUMBER),
            unit,
            department: self.text(columns::DEPARTMENT),
            inspected_on,
            responsible_officer: self.text(columns::OFFICER),
            nc_category,
            nc_description,
            initial_stage: self.text(columns::INITIAL_STAGE),
            intermediate_stage: self.text(columns::INTERMEDIATE_STAGE),
            conclusive_stage: self.text(columns::CONCLUSIVE_STAGE),
            remediation_start,
            allotted_days: self.days(columns::ALLOTTED_DAYS),
            remediation_end,
            status: self.optional_text(columns::STATUS),
            next_inspection_due,
            criticality: self.text(columns::CRITICALITY),
        };
        Ok((record, unreadable))
    }

    fn deadline_control(&self) -> Result<(DeadlineControlRecord, usize), &'static str> {
        let unit = self.text(columns::UNIT);
        if unit.is_empty() {
            return Err("missing unit");
        }
        let non_conformity = self.text(columns::NON_CONFORMITY);
        if non_conformity.is_empty() {
            return Err("missing non-conformity");
        }

        let mut unreadable = 0;
        let mut date = |aliases: &[&str]| {
            self.date(aliases).unwrap_or_else(|()| {
                unreadable += 1;
                None
            })
        };
        let received_on = date(columns::RECEIVED_ON);
        let deadline = date(columns::DEADLINE);

        let record = DeadlineControlRecord {
            unit,
            letter_ref: self.text(columns::LETTER_REF),
            document_links: self.links(columns::LINKS),
            non_conformity,
            received_on,
            deadline,
            status: control_status(self.optional_text(columns::STATUS).as_deref()),
            notes: self.text(columns::NOTES),
        };
        Ok((record, unreadable))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => number.as_f64().map(format_numeric),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn cell_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(number) => number.as_f64().and_then(excel_serial_to_date),
        Value::String(text) => parse_calendar_date(text),
        _ => None,
    }
}

/// Whole days from `30`, `30.0` or `"30 dias"`.
fn cell_days(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|days| days.is_finite() && *days >= 0.0 && *days <= f64::from(u32::MAX))
            .map(|days| days.trunc() as u32),
        Value::String(text) => {
            let digits: String = text
                .trim()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn control_status(raw: Option<&str>) -> ControlStatus {
    let Some(raw) = raw else {
        return ControlStatus::Pending;
    };
    match ExplicitStatus::parse(raw) {
        Some(ExplicitStatus::Regularized) => ControlStatus::Regularized,
        Some(ExplicitStatus::NotRegularized) => ControlStatus::NotRegularized,
        Some(ExplicitStatus::Pending) => ControlStatus::Pending,
        None => {
            warn!(status = raw, "unknown deadline status, treating as pending");
            ControlStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn column_names_are_matched_loosely() {
        let rows = json!([{
            "Nº": 7,
            "UNIDADE": " 3ª DT ",
            "Departamento": "DEPOM",
            "Data da Inspeção": 45366,
            "Não Conformidade": "Extintor vencido",
            "Prazo (dias)": "30 dias",
            "Início da Regularização": "01/04/2024",
            "Situação": "Pendente",
            "Criticidade": "Alta"
        }]);
        let outcome = load_inspections_value(&rows, DuplicatePolicy::Reject).unwrap();
        let record = &outcome.dataset.inspections[0];
        assert_eq!(record.number, "7");
        assert_eq!(record.unit, "3ª DT");
        assert_eq!(record.inspected_on, ymd(2024, 3, 15));
        assert_eq!(record.allotted_days, Some(30));
        assert_eq!(record.remediation_deadline(), ymd(2024, 5, 1));
        assert_eq!(record.status.as_deref(), Some("Pendente"));
        assert!(outcome.report.is_clean());
    }

    #[test]
    fn rows_without_identity_are_skipped() {
        let rows = json!([
            { "unidade": "", "nao_conformidade": "x" },
            { "unidade": "1ª DT" },
            "not a row",
            { "unidade": "1ª DT", "descricao": "Sem lacre na sala de custódia" }
        ]);
        let outcome = load_inspections_value(&rows, DuplicatePolicy::Reject).unwrap();
        assert_eq!(outcome.dataset.inspections.len(), 1);
        assert_eq!(
            outcome.dataset.inspections[0].nc_category,
            "Sem lacre na sala de custódia"
        );
        let skipped: Vec<usize> = outcome.report.skipped.iter().map(|issue| issue.row).collect();
        assert_eq!(skipped, vec![0, 1, 2]);
    }

    #[test]
    fn duplicates_rejected_or_merged() {
        let rows = json!([
            {
                "oficio": "Of. 10/2024",
                "unidade": "2ª DT",
                "nao_conformidade": "Cela",
                "obs": "first"
            },
            {
                "oficio": "Of. 10/2024",
                "unidade": "2ª DT ",
                "nao_conformidade": "Cela",
                "obs": "second"
            },
            { "oficio": "Of. 11/2024", "unidade": "2ª DT", "nao_conformidade": "Cela" }
        ]);

        let rejected = load_deadlines_value(&rows, DuplicatePolicy::Reject).unwrap();
        assert_eq!(rejected.dataset.deadlines.len(), 2);
        assert_eq!(rejected.dataset.deadlines[0].notes, "first");
        assert_eq!(
            rejected.report.duplicates,
            vec![DuplicateRow {
                collection: Collection::Deadlines,
                row: 1,
                first_row: 0,
                merged: false,
            }]
        );

        let merged = load_deadlines_value(&rows, DuplicatePolicy::Merge).unwrap();
        assert_eq!(merged.dataset.deadlines.len(), 2);
        assert_eq!(merged.dataset.deadlines[0].notes, "second");
        assert!(merged.report.duplicates[0].merged);
    }

    #[test]
    fn unreadable_dates_are_counted_not_fatal() {
        let rows = json!([{
            "unidade": "DRFRV - Feira de Santana",
            "nao_conformidade": "Viatura sem manutenção",
            "prazo": "assim que possível",
            "status": "regularizado",
            "links": "https://sei.example/doc/1; https://sei.example/doc/2"
        }]);
        let outcome = load_deadlines_value(&rows, DuplicatePolicy::Reject).unwrap();
        let record = &outcome.dataset.deadlines[0];
        assert_eq!(record.deadline, None);
        assert_eq!(record.status, ControlStatus::Regularized);
        assert_eq!(record.document_links.len(), 2);
        assert_eq!(outcome.report.unreadable_dates, 1);
    }

    #[test]
    fn top_level_shape_errors() {
        assert!(matches!(
            load_dataset_str("[]", DuplicatePolicy::Reject),
            Err(ComplianceError::Parse(_))
        ));
        assert!(matches!(
            load_dataset_str(r#"{"other": []}"#, DuplicatePolicy::Reject),
            Err(ComplianceError::MissingData)
        ));
        assert!(matches!(
            load_dataset_str(r#"{"prazos": {}}"#, DuplicatePolicy::Reject),
            Err(ComplianceError::Parse(_))
        ));
        assert!(matches!(
            load_dataset_str("{not json", DuplicatePolicy::Reject),
            Err(ComplianceError::Parse(_))
        ));
    }

    #[test]
    fn numeric_cells_render_as_text() {
        assert_eq!(format_numeric(12.0), "12");
        assert_eq!(format_numeric(12.5), "12.5");
        assert_eq!(cell_days(&json!(15.9)), Some(15));
        assert_eq!(cell_days(&json!(-2)), None);
    }

    #[test]
    fn short_number_in_text_date_cell_is_unreadable() {
        let rows = json!([
            { "oficio": "Of. 20/2024", "unidade": "3ª DT", "nc": "Cela", "prazo": "30" },
            { "oficio": "Of. 21/2024", "unidade": "3ª DT", "nc": "Cela", "prazo": "45366" },
            { "oficio": "Of. 22/2024", "unidade": "3ª DT", "nc": "Cela", "prazo": 45366 }
        ]);
        let outcome = load_deadlines_value(&rows, DuplicatePolicy::Reject).unwrap();
        assert_eq!(outcome.report.unreadable_dates, 1);
        let deadlines: Vec<Option<NaiveDate>> = outcome
            .dataset
            .deadlines
            .iter()
            .map(|record| record.deadline)
            .collect();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(deadlines, vec![None, expected, expected]);
    }
}
