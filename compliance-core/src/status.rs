//! Single place that turns a record's stored status and deadline into the
//! state shown on every dashboard view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::days_remaining;
use crate::text::fold_token;
use crate::{DashboardConfig, DeadlineControlRecord, InspectionRecord};

/// Display state of a tracked record, in dashboard display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Overdue,
    NearDue,
    OnTrack,
    NotRegularized,
    Regularized,
    Undefined,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 6] = [
        StatusCategory::Overdue,
        StatusCategory::NearDue,
        StatusCategory::OnTrack,
        StatusCategory::NotRegularized,
        StatusCategory::Regularized,
        StatusCategory::Undefined,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCategory::Overdue => "overdue",
            StatusCategory::NearDue => "near_due",
            StatusCategory::OnTrack => "on_track",
            StatusCategory::NotRegularized => "not_regularized",
            StatusCategory::Regularized => "regularized",
            StatusCategory::Undefined => "undefined",
        }
    }

    /// User-facing label.
    pub fn label(self) -> &'static str {
        match self {
            StatusCategory::Overdue => "Vencido",
            StatusCategory::NearDue => "Próximo do vencimento",
            StatusCategory::OnTrack => "No prazo",
            StatusCategory::NotRegularized => "Não regularizado",
            StatusCategory::Regularized => "Regularizado",
            StatusCategory::Undefined => "Prazo não definido",
        }
    }

    /// Set by an explicit status rather than by the calendar.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatusCategory::Regularized | StatusCategory::NotRegularized
        )
    }
}

/// Stored status values the classifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitStatus {
    Pending,
    Regularized,
    NotRegularized,
}

impl ExplicitStatus {
    /// Lenient parse of the free-text status column. Unknown text is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_token(raw).as_str() {
            "regularized" | "regularizado" | "regularizada" => Some(ExplicitStatus::Regularized),
            "not_regularized" | "nao_regularizado" | "nao_regularizada" => {
                Some(ExplicitStatus::NotRegularized)
            }
            "pending" | "pendente" | "em_andamento" => Some(ExplicitStatus::Pending),
            _ => None,
        }
    }
}

/// A record that carries a deadline and possibly an explicit status.
pub trait Trackable {
    fn explicit_status(&self) -> Option<&str>;
    fn deadline(&self) -> Option<NaiveDate>;
}

impl Trackable for DeadlineControlRecord {
    fn explicit_status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn deadline(&self) -> Option<NaiveDate> {
        self.deadline
    }
}

impl Trackable for InspectionRecord {
    fn explicit_status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn deadline(&self) -> Option<NaiveDate> {
        self.remediation_deadline()
    }
}

impl<T: Trackable + ?Sized> Trackable for &T {
    fn explicit_status(&self) -> Option<&str> {
        (**self).explicit_status()
    }

    fn deadline(&self) -> Option<NaiveDate> {
        (**self).deadline()
    }
}

/// Classifies with the default thresholds.
pub fn classify_status<T: Trackable + ?Sized>(record: &T, today: NaiveDate) -> StatusCategory {
    classify_status_with(record, today, &DashboardConfig::default())
}

/// First match wins: explicit terminal statuses, then missing deadline, then
/// the remaining-day buckets. A regularized record is never reported overdue.
pub fn classify_status_with<T: Trackable + ?Sized>(
    record: &T,
    today: NaiveDate,
    config: &DashboardConfig,
) -> StatusCategory {
    match record.explicit_status().and_then(ExplicitStatus::parse) {
        Some(ExplicitStatus::Regularized) => return StatusCategory::Regularized,
        Some(ExplicitStatus::NotRegularized) => return StatusCategory::NotRegularized,
        Some(ExplicitStatus::Pending) | None => {}
    }

    let Some(deadline) = record.deadline() else {
        return StatusCategory::Undefined;
    };

    let remaining = days_remaining(Some(deadline), today);
    if remaining > config.near_due_days {
        StatusCategory::OnTrack
    } else if remaining >= 1 {
        StatusCategory::NearDue
    } else {
        StatusCategory::Overdue
    }
}
