use crate::attendance::AppEngine;
use crate::attendance::engine::{EngineError, HistoryPage, HistoryQuery, Rejection, RejectionKind};
use crate::attendance::export::render_csv;
use crate::attendance::record::{AttendanceStatus, EnrichedRecord};
use crate::attendance::store::SortKey;
use crate::auth::auth::AuthUser;
use crate::model::user::UserProfile;
use crate::utils::profile_cache;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::error;
use utoipa::ToSchema;

pub const MAX_NOTE_LEN: usize = 500;

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    /// Explicit check-in instant; defaults to now
    #[schema(example = "2024-01-10T09:00:00+05:30", format = "date-time", value_type = Option<String>)]
    pub check_in_at: Option<DateTime<Utc>>,
    #[schema(example = "working from the client site")]
    pub note: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutRequest {
    /// Explicit check-out instant; defaults to now
    #[schema(example = "2024-01-10T17:30:00+05:30", format = "date-time", value_type = Option<String>)]
    pub check_out_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct ManualCheckOutRequest {
    /// Required override instant for the targeted record
    #[schema(example = "2024-01-10T18:00:00+05:30", format = "date-time", value_type = String)]
    pub manual_check_out_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HistoryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[schema(example = "2024-01-01", format = "date", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[schema(example = "2024-01-31", format = "date", value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    /// date | -date | check_in_at | -check_in_at
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExportParams {
    #[schema(example = "2024-01-01", format = "date", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[schema(example = "2024-01-31", format = "date", value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceActionResponse {
    #[schema(example = "Checked in successfully")]
    pub message: String,
    pub record: EnrichedRecord,
}

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    pub record: Option<EnrichedRecord>,
}

/// Profile lookup the engine depends on; a missing row means the token
/// outlived the account.
async fn load_profile(pool: &SqlitePool, user_id: i64) -> actix_web::Result<UserProfile> {
    match profile_cache::get_profile(pool, user_id).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(actix_web::error::ErrorUnauthorized("User not found")),
        Err(e) => {
            error!(error = %e, user_id, "Failed to load user profile");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Business-rule rejections come back as values; map each to the response
/// the original API contract promises.
fn rejection_response(rejection: &Rejection) -> HttpResponse {
    let body = match rejection.record() {
        Some(record) => json!({
            "message": rejection.to_string(),
            "record": record
        }),
        None => json!({ "message": rejection.to_string() }),
    };

    match rejection {
        Rejection::DuplicateCheckIn(_) => HttpResponse::Conflict().json(body),
        _ => match rejection.kind() {
            RejectionKind::NotFound => HttpResponse::NotFound().json(body),
            _ => HttpResponse::BadRequest().json(body),
        },
    }
}

fn store_failure(e: EngineError, user_id: i64, action: &'static str) -> actix_web::Error {
    error!(error = %e, user_id, action, "Attendance store failure");
    actix_web::error::ErrorInternalServerError("Internal Server Error")
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in successfully", body = AttendanceActionResponse),
        (status = 400, description = "Invalid note or timestamp"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in for today"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    engine: web::Data<AppEngine>,
    payload: web::Json<CheckInRequest>,
) -> actix_web::Result<impl Responder> {
    if let Some(note) = &payload.note {
        if note.chars().count() > MAX_NOTE_LEN {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Note cannot exceed 500 characters"
            })));
        }
    }

    let profile = load_profile(pool.get_ref(), auth.user_id).await?;

    match engine
        .check_in(
            auth.user_id,
            &profile,
            payload.check_in_at,
            payload.note.clone(),
        )
        .await
    {
        Ok(record) => Ok(HttpResponse::Created().json(AttendanceActionResponse {
            message: "Checked in successfully".to_string(),
            record,
        })),
        Err(EngineError::Rejected(rejection)) => Ok(rejection_response(&rejection)),
        Err(e) => Err(store_failure(e, auth.user_id, "check_in")),
    }
}

/// Check-out endpoint (live, same-day)
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceActionResponse),
        (status = 400, description = "Already checked out, or invalid checkout time", body = Object, example = json!({
            "message": "Check-out time must be after check-in time"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No check-in found for today", body = Object, example = json!({
            "message": "No check-in record found for today. Please check in first."
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    engine: web::Data<AppEngine>,
    payload: web::Json<CheckOutRequest>,
) -> actix_web::Result<impl Responder> {
    let profile = load_profile(pool.get_ref(), auth.user_id).await?;

    match engine
        .check_out(auth.user_id, &profile, payload.check_out_at)
        .await
    {
        Ok(record) => Ok(HttpResponse::Ok().json(AttendanceActionResponse {
            message: "Checked out successfully".to_string(),
            record,
        })),
        Err(EngineError::Rejected(rejection)) => Ok(rejection_response(&rejection)),
        Err(e) => Err(store_failure(e, auth.user_id, "check_out")),
    }
}

/// Manual check-out for editing a past record
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{record_id}/checkout",
    params(
        ("record_id" = i64, Path, description = "Attendance record ID")
    ),
    request_body = ManualCheckOutRequest,
    responses(
        (status = 200, description = "Manual check-out recorded", body = AttendanceActionResponse),
        (status = 400, description = "Invalid checkout time"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Record not found", body = Object, example = json!({
            "message": "Attendance record not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn manual_check_out(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    engine: web::Data<AppEngine>,
    path: web::Path<i64>,
    payload: web::Json<ManualCheckOutRequest>,
) -> actix_web::Result<impl Responder> {
    let record_id = path.into_inner();
    let profile = load_profile(pool.get_ref(), auth.user_id).await?;

    match engine
        .manual_check_out(
            auth.user_id,
            &profile,
            record_id,
            payload.manual_check_out_at,
        )
        .await
    {
        Ok(record) => Ok(HttpResponse::Ok().json(AttendanceActionResponse {
            message: "Manual check-out recorded".to_string(),
            record,
        })),
        Err(EngineError::Rejected(rejection)) => Ok(rejection_response(&rejection)),
        Err(e) => Err(store_failure(e, auth.user_id, "manual_check_out")),
    }
}

/// Today's attendance record
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's record, null when not checked in", body = TodayResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    engine: web::Data<AppEngine>,
) -> actix_web::Result<impl Responder> {
    let profile = load_profile(pool.get_ref(), auth.user_id).await?;

    match engine.today(auth.user_id, &profile).await {
        Ok(record) => Ok(HttpResponse::Ok().json(TodayResponse { record })),
        Err(e) => Err(store_failure(e, auth.user_id, "today")),
    }
}

/// Attendance history with filtering and pagination
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(
        ("page" = Option<i64>, Query, description = "Page number, starting at 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, 1-100"),
        ("from" = Option<String>, Query, description = "Inclusive lower day bound, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Inclusive upper day bound, YYYY-MM-DD"),
        ("status" = Option<String>, Query, description = "active | completed | manual_override"),
        ("sort" = Option<String>, Query, description = "date | -date | check_in_at | -check_in_at")
    ),
    responses(
        (status = 200, description = "Paginated history", body = HistoryPage),
        (status = 400, description = "Invalid sort key"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    params: web::Query<HistoryParams>,
) -> actix_web::Result<impl Responder> {
    let sort = match params.sort.as_deref() {
        Some(s) => match SortKey::parse(s) {
            Some(key) => key,
            None => {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": "Invalid sort key. Allowed: date, -date, check_in_at, -check_in_at"
                })));
            }
        },
        None => SortKey::default(),
    };

    let query = HistoryQuery {
        from: params.from,
        to: params.to,
        status: params.status,
        page: params.page.unwrap_or(1).max(1),
        limit: params.limit.unwrap_or(10).clamp(1, 100),
        sort,
    };

    match engine.history(auth.user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(page)),
        Err(e) => Err(store_failure(e, auth.user_id, "history")),
    }
}

/// Get one attendance record
#[utoipa::path(
    get,
    path = "/api/v1/attendance/{record_id}",
    params(
        ("record_id" = i64, Path, description = "Attendance record ID")
    ),
    responses(
        (status = 200, description = "Record found", body = EnrichedRecord),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Record not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_record(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    match engine.find(auth.user_id, path.into_inner()).await {
        Ok(record) => Ok(HttpResponse::Ok().json(record)),
        Err(EngineError::Rejected(rejection)) => Ok(rejection_response(&rejection)),
        Err(e) => Err(store_failure(e, auth.user_id, "get_record")),
    }
}

/// Delete an attendance record
#[utoipa::path(
    delete,
    path = "/api/v1/attendance/{record_id}",
    params(
        ("record_id" = i64, Path, description = "Attendance record ID")
    ),
    responses(
        (status = 200, description = "Record deleted", body = Object, example = json!({
            "message": "Attendance record deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Record not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn delete_record(
    auth: AuthUser,
    engine: web::Data<AppEngine>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    match engine.delete(auth.user_id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "message": "Attendance record deleted"
        }))),
        Err(EngineError::Rejected(rejection)) => Ok(rejection_response(&rejection)),
        Err(e) => Err(store_failure(e, auth.user_id, "delete_record")),
    }
}

/// Export attendance history as CSV
#[utoipa::path(
    get,
    path = "/api/v1/attendance/export",
    params(
        ("from" = Option<String>, Query, description = "Inclusive lower day bound, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Inclusive upper day bound, YYYY-MM-DD"),
        ("status" = Option<String>, Query, description = "active | completed | manual_override")
    ),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn export(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    engine: web::Data<AppEngine>,
    params: web::Query<ExportParams>,
) -> actix_web::Result<impl Responder> {
    let profile = load_profile(pool.get_ref(), auth.user_id).await?;

    let rows = match engine
        .export_rows(auth.user_id, params.from, params.to, params.status)
        .await
    {
        Ok(rows) => rows,
        Err(e) => return Err(store_failure(e, auth.user_id, "export")),
    };

    let csv = render_csv(&rows, engine.timezone_for(&profile));

    let bound = |d: Option<NaiveDate>| d.map_or_else(|| "all".to_string(), |d| d.to_string());
    let filename = format!(
        "attendance_{}_{}.csv",
        bound(params.from),
        bound(params.to)
    );

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(csv))
}
