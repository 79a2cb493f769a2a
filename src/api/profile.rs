use crate::auth::auth::AuthUser;
use crate::utils::profile_cache;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::error;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema, sqlx::FromRow)]
pub struct ProfileResponse {
    pub id: i64,
    #[schema(example = "asha")]
    pub username: String,
    pub display_name: Option<String>,
    #[schema(example = "Asia/Kolkata")]
    pub timezone: Option<String>,
    #[schema(example = 480)]
    pub default_work_duration_minutes: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    #[schema(example = "Asia/Kolkata")]
    pub timezone: Option<String>,
    #[schema(example = 480)]
    pub default_work_duration_minutes: Option<i64>,
}

async fn fetch_profile(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<ProfileResponse>, sqlx::Error> {
    sqlx::query_as::<_, ProfileResponse>(
        r#"
        SELECT id, username, display_name, timezone, default_work_duration_minutes
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses(
        (status = 200, description = "Profile found", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn get_profile(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let profile = fetch_profile(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = auth.user_id, "Failed to fetch profile");
            ErrorInternalServerError("Internal Server Error")
        })?;

    match profile {
        Some(profile) => Ok(HttpResponse::Ok().json(profile)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Profile not found"
        }))),
    }
}

/// Update the caller's profile
#[utoipa::path(
    put,
    path = "/api/v1/profile",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid timezone or work duration"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<UpdateProfile>,
) -> actix_web::Result<impl Responder> {
    if let Some(tz) = &payload.timezone {
        if tz.parse::<Tz>().is_err() {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "timezone must be a valid IANA identifier"
            })));
        }
    }

    if let Some(minutes) = payload.default_work_duration_minutes {
        if !(1..=1440).contains(&minutes) {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "default_work_duration_minutes must be between 1 and 1440"
            })));
        }
    }

    // Build the SET clause from the provided fields only
    let mut sets: Vec<&str> = Vec::new();
    if payload.display_name.is_some() {
        sets.push("display_name = ?");
    }
    if payload.timezone.is_some() {
        sets.push("timezone = ?");
    }
    if payload.default_work_duration_minutes.is_some() {
        sets.push("default_work_duration_minutes = ?");
    }

    if sets.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "No fields provided for update"
        })));
    }

    let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));

    let mut query = sqlx::query(&sql);
    if let Some(name) = &payload.display_name {
        query = query.bind(name);
    }
    if let Some(tz) = &payload.timezone {
        query = query.bind(tz);
    }
    if let Some(minutes) = payload.default_work_duration_minutes {
        query = query.bind(minutes);
    }
    query = query.bind(auth.user_id);

    let affected = query
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, user_id = auth.user_id, "Failed to update profile");
            ErrorInternalServerError("Internal Server Error")
        })?
        .rows_affected();

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Profile not found"
        })));
    }

    // The engine must see the new timezone/work duration on the next request
    profile_cache::invalidate(auth.user_id).await;

    let profile = fetch_profile(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = auth.user_id, "Failed to fetch profile");
            ErrorInternalServerError("Internal Server Error")
        })?;

    match profile {
        Some(profile) => Ok(HttpResponse::Ok().json(profile)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Profile not found"
        }))),
    }
}
