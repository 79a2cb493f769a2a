/// The slice of the user profile the attendance engine consumes; full user
/// rows only ever surface through the auth and profile handlers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserProfile {
    /// IANA identifier; `None` falls back to the configured default.
    pub timezone: Option<String>,
    pub default_work_duration_minutes: i64,
}
