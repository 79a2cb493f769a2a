use crate::api::attendance::{
    AttendanceActionResponse, CheckInRequest, CheckOutRequest, ExportParams, HistoryParams,
    ManualCheckOutRequest, TodayResponse,
};
use crate::api::profile::{ProfileResponse, UpdateProfile};
use crate::attendance::engine::HistoryPage;
use crate::attendance::record::{AttendanceRecord, AttendanceStatus, EnrichedRecord};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Punchclock API",
        version = "1.0.0",
        description = r#"
## Punchclock — attendance tracking API

Per-user daily check-in/check-out with timezone-aware attendance days.

### 🔹 Key Features
- **Check-in / Check-out**
  - One record per user per calendar day, resolved in the user's timezone
  - Computed checkout fallback from the profile's work duration
- **Manual corrections**
  - Retroactive check-out override for past records
- **History & Export**
  - Filter by day range and derived status, paginate, export as CSV

### 🔐 Security
All attendance endpoints are protected using **JWT Bearer authentication**
with refresh-token rotation.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for history

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::manual_check_out,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::get_record,
        crate::api::attendance::delete_record,
        crate::api::attendance::export,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile
    ),
    components(
        schemas(
            CheckInRequest,
            CheckOutRequest,
            ManualCheckOutRequest,
            HistoryParams,
            ExportParams,
            AttendanceActionResponse,
            TodayResponse,
            AttendanceRecord,
            EnrichedRecord,
            AttendanceStatus,
            HistoryPage,
            ProfileResponse,
            UpdateProfile
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance tracking APIs"),
        (name = "Profile", description = "User profile APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
