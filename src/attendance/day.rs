use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

/// Calendar day an instant falls on in the given timezone. This is the join
/// key for all per-day attendance records, so it must be computed in the
/// user's zone, never in UTC or server-local time.
pub fn local_day(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Expected checkout implied by the work-duration policy. Exact minute
/// arithmetic, no rounding.
pub fn computed_check_out(check_in: DateTime<Utc>, duration_minutes: i64) -> DateTime<Utc> {
    check_in + Duration::minutes(duration_minutes)
}

/// Resolve a profile timezone string against the IANA database, falling back
/// to the configured default when the profile has none or names an unknown
/// zone.
pub fn resolve_timezone(name: Option<&str>, fallback: Tz) -> Tz {
    match name {
        Some(s) => s.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = s, "Unknown timezone in profile, using fallback");
            fallback
        }),
        None => fallback,
    }
}
