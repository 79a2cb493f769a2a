use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One attendance record per (user, calendar-day-in-user's-timezone).
/// `user_id`, `date`, `check_in_at`, `computed_check_out_at` and `note` are
/// immutable once created; `check_out_at` / `manual_check_out_at` are each
/// set by their own transition.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2024-01-10T03:30:00Z", format = "date-time", value_type = String)]
    pub check_in_at: DateTime<Utc>,
    #[schema(example = "2024-01-10T11:30:00Z", format = "date-time", value_type = String)]
    pub computed_check_out_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub check_out_at: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub manual_check_out_at: Option<DateTime<Utc>>,
    pub is_checked_out: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Active,
    Completed,
    ManualOverride,
}

impl AttendanceStatus {
    /// Display label used by the CSV export.
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::Active => "Active",
            AttendanceStatus::Completed => "Completed",
            AttendanceStatus::ManualOverride => "Manual Override",
        }
    }
}

impl AttendanceRecord {
    /// Manual override wins over the actual checkout, which wins over the
    /// computed fallback.
    pub fn actual_check_out_at(&self) -> DateTime<Utc> {
        self.manual_check_out_at
            .or(self.check_out_at)
            .unwrap_or(self.computed_check_out_at)
    }

    /// Minutes between check-in and the effective checkout, rounded to the
    /// nearest integer.
    pub fn duration_minutes(&self) -> i64 {
        let seconds = (self.actual_check_out_at() - self.check_in_at).num_seconds();
        (seconds as f64 / 60.0).round() as i64
    }

    /// Pure function of the stored fields and `now`; the single source of
    /// truth for both the single-record and list read paths.
    pub fn status(&self, now: DateTime<Utc>) -> AttendanceStatus {
        if self.manual_check_out_at.is_some() {
            return AttendanceStatus::ManualOverride;
        }
        if self.is_checked_out && self.check_out_at.is_some() {
            return AttendanceStatus::Completed;
        }
        if now >= self.computed_check_out_at {
            return AttendanceStatus::Completed;
        }
        AttendanceStatus::Active
    }

    pub fn enriched(&self, now: DateTime<Utc>) -> EnrichedRecord {
        EnrichedRecord {
            actual_check_out_at: self.actual_check_out_at(),
            duration_minutes: self.duration_minutes(),
            status: self.status(now),
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            check_in_at: self.check_in_at,
            computed_check_out_at: self.computed_check_out_at,
            check_out_at: self.check_out_at,
            manual_check_out_at: self.manual_check_out_at,
            is_checked_out: self.is_checked_out,
            note: self.note.clone(),
        }
    }
}

/// Read-side projection: the stored record plus the derived fields. Never
/// persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnrichedRecord {
    pub id: i64,
    pub user_id: i64,
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2024-01-10T03:30:00Z", format = "date-time", value_type = String)]
    pub check_in_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub computed_check_out_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub check_out_at: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub manual_check_out_at: Option<DateTime<Utc>>,
    pub is_checked_out: bool,
    pub note: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub actual_check_out_at: DateTime<Utc>,
    #[schema(example = 480)]
    pub duration_minutes: i64,
    #[schema(example = "active")]
    pub status: AttendanceStatus,
}
