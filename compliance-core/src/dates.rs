//! Calendar helpers: remaining-day counts, spreadsheet serial dates and
//! localized rendering.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Label rendered when a record has no date.
pub const NOT_DEFINED_LABEL: &str = "Não definido";

/// Days between the spreadsheet epoch (1899-12-30) and 1970-01-01.
pub const EXCEL_UNIX_EPOCH_OFFSET: i64 = 25_569;

/// Serial of 9999-12-31, the last date a spreadsheet can hold.
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// First serial after the fictitious 1900-02-29.
const EXCEL_LEAP_BUG_SERIAL: i64 = 60;

/// Serial of 2000-01-01. Text below it is a day count or a year, not a date.
const MIN_TEXT_SERIAL: f64 = 36_526.0;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Days left until `deadline`. Zero when due today, negative when overdue.
///
/// A missing deadline yields `0` so a single incomplete record never breaks a
/// view.
pub fn days_remaining(deadline: Option<NaiveDate>, today: NaiveDate) -> i64 {
    match deadline {
        Some(deadline) => deadline.signed_duration_since(today).num_days(),
        None => 0,
    }
}

/// Same as [`days_remaining`], with both instants truncated to midnight first.
pub fn days_remaining_at(deadline: NaiveDateTime, now: NaiveDateTime) -> i64 {
    days_remaining(Some(deadline.date()), now.date())
}

/// Parses `raw` leniently and counts the days left; unparseable input is `0`.
pub fn days_remaining_str(raw: &str, today: NaiveDate) -> i64 {
    days_remaining(parse_calendar_date(raw), today)
}

fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?
        .checked_sub_signed(Duration::days(EXCEL_UNIX_EPOCH_OFFSET))
}

/// Converts a spreadsheet day count into a calendar date.
///
/// Serial 1 is 1900-01-01. Spreadsheets count a 1900-02-29 that never
/// existed, so serials below 60 are shifted by one day to line up with the
/// 1899-12-30 epoch used for everything after it. Fractions (time of day) are
/// dropped.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    let epoch = excel_epoch()?;
    let offset = if days < EXCEL_LEAP_BUG_SERIAL {
        days + 1
    } else {
        days
    };
    epoch.checked_add_signed(Duration::days(offset))
}

/// Parses the date shapes found in the imported sheets.
///
/// Accepts ISO dates, ISO/RFC 3339 date-times (date part kept), Brazilian
/// `DD/MM/YYYY` and bare spreadsheet serials from 2000-01-01 on. Shorter
/// numbers such as `"30"` or `"2024"` are rejected.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|value| value.date_naive())
        })
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|value| value.date())
        })
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y").ok())
        .or_else(|| text_serial(trimmed))
}

fn text_serial(trimmed: &str) -> Option<NaiveDate> {
    let whole = trimmed.split('.').next().unwrap_or_default();
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|serial| *serial >= MIN_TEXT_SERIAL)
        .and_then(excel_serial_to_date)
}

/// Renders `DD/MM/YYYY`, or [`NOT_DEFINED_LABEL`] for a missing date.
pub fn format_localized(date: Option<NaiveDate>) -> String {
    date.map(|value| value.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| NOT_DEFINED_LABEL.to_string())
}

/// Today's date in the machine's local timezone.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Year-month bucket for time series; orders chronologically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    /// Short pt-BR label, e.g. `mar/2024`.
    pub fn label(&self) -> String {
        let name = MONTH_ABBREVIATIONS
            .get(self.month.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("???");
        format!("{name}/{}", self.year)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Year-month bucket of `date`.
pub fn month_key(date: NaiveDate) -> MonthKey {
    MonthKey {
        year: date.year(),
        month: date.month(),
    }
}
