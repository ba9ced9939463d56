use crate::api::leave_request::{
    CreateLeave, DecisionBody, DecisionResponse, LeaveListResponse, LeaveResponse,
    SubmitLeaveResponse,
};
use crate::api::notification::{NotificationListResponse, NotificationResponse};
use crate::api::user::{AssignRoles, UserResponse};
use crate::models::{LoginReqDto, LoginResponse, RegisterReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Approval API",
        version = "1.0.0",
        description = r#"
## Leave Request Approval & Notification Service

Employees submit leave requests; managers and supervisors decide them.
Every step notifies the people involved.

### 🔹 Key Features
- **Leave Requests**
  - Submit, list, view, approve, reject and withdraw
- **Notifications**
  - Persistent per-user inbox with read tracking
  - Live delivery over server-sent events (`ReceiveNotification`)
- **Audit**
  - An email to the audit mailbox for every decision
- **Users**
  - Self-service registration, admin role assignment

### 🔐 Security
All `/api` endpoints require a **JWT Bearer** token from `/auth/login`.
Only **MANAGER**, **SUPERVISOR** or **ADMIN** can decide requests.

### ⚠️ Partial delivery
Submit and decide succeed even when a notification, push or audit email
fails. Such responses carry `degraded: true` and a list of `warnings`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::withdraw_leave,

        crate::api::notification::list_notifications,
        crate::api::notification::unread_count,
        crate::api::notification::mark_read,
        crate::api::notification::notification_stream,

        crate::api::user::assign_roles
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            CreateLeave,
            DecisionBody,
            LeaveResponse,
            LeaveListResponse,
            SubmitLeaveResponse,
            DecisionResponse,
            NotificationResponse,
            NotificationListResponse,
            AssignRoles,
            UserResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Leave", description = "Leave request workflow APIs"),
        (name = "Notification", description = "Notification inbox and live push"),
        (name = "User", description = "Role administration"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
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
