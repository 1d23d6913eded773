use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use compliance_core::aggregate::{by_criticality, by_department, by_non_conformity, by_unit};
use compliance_core::{
    build_snapshot, deadline_rows, filter_records, local_today, page_window, paginate,
    parse_calendar_date, top_n, unit_report, DashboardConfig, DashboardSnapshot, Dataset,
    DeadlineRow, FilterConfig, GroupCount, InspectionRecord, Page, UnitReport,
};
use compliance_import::{load_dataset_str, DuplicatePolicy};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "compliance-cli",
    about = "Summarize inspection findings and regularization deadlines from a spreadsheet export."
)]
struct Args {
    /// Path to the exported JSON file.
    #[arg(short, long)]
    input: PathBuf,

    /// Reference date (YYYY-MM-DD or DD/MM/YYYY). Defaults to the local date.
    #[arg(long)]
    today: Option<String>,

    /// JSON file with dashboard thresholds.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replace earlier rows with later rows sharing the same identity.
    #[arg(long)]
    merge_duplicates: bool,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Headline counts, status breakdown and urgent deadlines.
    Summary,
    /// Filtered, paginated deadline-control table.
    Deadlines {
        #[arg(long)]
        unit: Option<String>,
        /// Stored status: pending, regularized or not_regularized.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        department: Option<String>,
        /// Case-insensitive text searched in unit and non-conformity.
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Units present in the export, in display order.
    Units,
    /// Most frequent values of an inspection field.
    Top {
        #[arg(long, value_enum, default_value_t = TopField::NonConformity)]
        by: TopField,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Inspections and deadlines of one unit.
    UnitReport { unit: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TopField {
    NonConformity,
    Department,
    Unit,
    Criticality,
}

#[derive(Serialize)]
struct DeadlineTable<'a> {
    filter: &'a FilterConfig,
    #[serde(flatten)]
    page: Page<'a, DeadlineRow>,
    window: Vec<usize>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let today = match args.today.as_deref() {
        Some(raw) => parse_calendar_date(raw)
            .with_context(|| format!("could not read --today value {raw:?}"))?,
        None => local_today(),
    };
    let config = load_config(args.config.as_deref())?;
    let dataset = load_dataset(&args.input, args.merge_duplicates)?;
    debug!(%today, ?config, "dashboard parameters");

    match args.command {
        Command::Summary => summary(&dataset, today, &config, args.json),
        Command::Deadlines {
            unit,
            status,
            department,
            query,
            page,
            page_size,
        } => {
            let filter = FilterConfig {
                unit: unit.unwrap_or_default(),
                status: status.unwrap_or_default(),
                department: department.unwrap_or_default(),
                query: query.unwrap_or_default(),
            };
            let page_size = page_size.unwrap_or(config.page_size);
            if page_size == 0 {
                bail!("--page-size must be at least 1");
            }
            deadlines(&dataset, &filter, page, page_size, today, &config, args.json)
        }
        Command::Units => units(&dataset, today, &config, args.json),
        Command::Top { by, limit } => top(&dataset, by, limit.unwrap_or(config.top_n), args.json),
        Command::UnitReport { unit } => report(&dataset, &unit, today, &config, args.json),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DashboardConfig> {
    let Some(path) = path else {
        return Ok(DashboardConfig::default());
    };
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("could not read config file {path:?}"))?;
    let config: DashboardConfig = serde_json::from_str(&data)
        .with_context(|| format!("could not parse config file {path:?}"))?;
    config.validate()?;
    Ok(config)
}

fn load_dataset(path: &Path, merge_duplicates: bool) -> anyhow::Result<Dataset> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("could not read input file {path:?}"))?;
    let policy = if merge_duplicates {
        DuplicatePolicy::Merge
    } else {
        DuplicatePolicy::Reject
    };
    let outcome = load_dataset_str(&data, policy)
        .with_context(|| format!("could not import {path:?}"))?;

    if outcome.dataset.is_empty() {
        warn!("export holds no inspections and no deadline controls");
    }
    if !outcome.report.is_clean() {
        warn!(
            skipped = outcome.report.skipped.len(),
            duplicates = outcome.report.duplicates.len(),
            unreadable_dates = outcome.report.unreadable_dates,
            "import finished with issues"
        );
    }
    info!(
        inspections = outcome.dataset.inspections.len(),
        deadlines = outcome.dataset.deadlines.len(),
        "dataset loaded"
    );
    Ok(outcome.dataset)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summary(
    dataset: &Dataset,
    today: NaiveDate,
    config: &DashboardConfig,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = build_snapshot(dataset, today, config);
    if json {
        return print_json(&snapshot);
    }
    print_summary(&snapshot);
    Ok(())
}

fn print_summary(snapshot: &DashboardSnapshot) {
    println!("As of: {}", snapshot.as_of.format("%d/%m/%Y"));
    println!("Inspections: {}", snapshot.total_inspections);
    println!("Deadline controls: {}", snapshot.total_deadlines);
    println!("Deadline status:");
    for group in &snapshot.deadline_status {
        println!("  {}: {}", group.key.label(), group.count);
    }
    println!("Urgent deadlines:");
    let mut any = false;
    for row in snapshot.urgent() {
        any = true;
        print_row(row);
    }
    if !any {
        println!("  none");
    }
}

fn print_row(row: &DeadlineRow) {
    println!(
        "  {:<24} {:<16} {:<10} {:>5}d  {}",
        row.record.unit,
        row.record.letter_ref,
        row.deadline_label,
        row.remaining_days,
        row.category_label
    );
}

fn deadlines(
    dataset: &Dataset,
    filter: &FilterConfig,
    page: usize,
    page_size: usize,
    today: NaiveDate,
    config: &DashboardConfig,
    json: bool,
) -> anyhow::Result<()> {
    let matching = filter_records(&dataset.deadlines, filter);
    let rows = deadline_rows(&matching, today, config);
    let slice = paginate(&rows, page, page_size);
    debug!(
        matching = rows.len(),
        page = slice.current_page,
        "deadline table"
    );

    if json {
        return print_json(&DeadlineTable {
            filter,
            window: slice.window(),
            page: slice,
        });
    }

    println!(
        "Page {}/{} ({} rows)",
        slice.current_page,
        slice.total_pages.max(1),
        slice.total_items
    );
    for row in slice.items {
        print_row(row);
    }
    let window: Vec<String> = page_window(slice.current_page, slice.total_pages)
        .iter()
        .map(ToString::to_string)
        .collect();
    if !window.is_empty() {
        println!("Pages: {}", window.join(" "));
    }
    Ok(())
}

fn units(
    dataset: &Dataset,
    today: NaiveDate,
    config: &DashboardConfig,
    json: bool,
) -> anyhow::Result<()> {
    let units = build_snapshot(dataset, today, config).units;
    if json {
        return print_json(&units);
    }
    for unit in units {
        println!("{unit}");
    }
    Ok(())
}

fn top(dataset: &Dataset, by: TopField, limit: usize, json: bool) -> anyhow::Result<()> {
    let records: &[InspectionRecord] = &dataset.inspections;
    let groups: Vec<GroupCount<String>> = match by {
        TopField::NonConformity => top_n(records, by_non_conformity, limit),
        TopField::Criticality => top_n(records, by_criticality, limit),
        TopField::Unit => top_n(records, |record| by_unit(record).0, limit),
        TopField::Department => top_n(records, |record| by_department(record).0, limit),
    };
    if json {
        return print_json(&groups);
    }
    for group in groups {
        println!("{:>4}  {}", group.count, group.key);
    }
    Ok(())
}

fn report(
    dataset: &Dataset,
    unit: &str,
    today: NaiveDate,
    config: &DashboardConfig,
    json: bool,
) -> anyhow::Result<()> {
    let report = unit_report(dataset, unit, today, config);
    if report.inspections.is_empty() && report.deadlines.is_empty() {
        bail!("no records for unit {unit:?}");
    }
    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &UnitReport) {
    println!("Unit: {}", report.unit);
    println!("Next inspection: {}", report.next_inspection_label);
    println!("Inspections: {}", report.inspections.len());
    for group in &report.non_conformities {
        println!("  {:>4}  {}", group.count, group.key);
    }
    println!("Deadlines: {}", report.deadlines.len());
    for row in &report.deadlines {
        print_row(row);
    }
}
