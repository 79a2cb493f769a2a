use crate::model::user::UserProfile;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::time::Duration;

/// Profile fields the engine reads on every attendance request, cached so a
/// burst of check-ins/outs doesn't hit the users table each time.
static PROFILE_CACHE: Lazy<Cache<i64, UserProfile>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

/// Read-through lookup. `None` means the user row no longer exists.
pub async fn get_profile(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<UserProfile>, sqlx::Error> {
    if let Some(profile) = PROFILE_CACHE.get(&user_id).await {
        return Ok(Some(profile));
    }

    let profile = sqlx::query_as::<_, UserProfile>(
        "SELECT timezone, default_work_duration_minutes FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    if let Some(p) = &profile {
        PROFILE_CACHE.insert(user_id, p.clone()).await;
    }

    Ok(profile)
}

/// Must be called after any profile update so the engine sees fresh
/// timezone/work-duration values.
pub async fn invalidate(user_id: i64) {
    PROFILE_CACHE.invalidate(&user_id).await;
}
