use crate::auth::auth::AuthUser;
use crate::model::{Decision, LeaveRequest, LeaveRequestId};
use crate::workflow::{ApprovalWorkflow, DecisionOutcome, DeliveryWarning, LeaveApplication};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "Vacation")]
    pub leave_type: Option<String>,
    #[schema(example = "Family trip")]
    pub comments: Option<String>,
}

impl From<CreateLeave> for LeaveApplication {
    fn from(body: CreateLeave) -> Self {
        LeaveApplication {
            start_date: body.start_date,
            end_date: body.end_date,
            leave_type: body.leave_type,
            comments: body.comments,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct DecisionBody {
    /// Reason shown to the employee on rejection
    #[schema(example = "Release week, please pick other dates")]
    pub comments: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    /// leave application id
    pub id: u64,
    /// employee who applied
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Vacation")]
    pub leave_type: String,
    #[schema(example = "Family trip", nullable = true)]
    pub comments: Option<String>,
    #[schema(example = "pending", value_type = String)]
    pub status: String,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    /// manager, supervisor or admin who decided the request
    #[schema(example = 7, nullable = true)]
    pub approver_id: Option<u64>,
}

impl From<LeaveRequest> for LeaveResponse {
    fn from(r: LeaveRequest) -> Self {
        LeaveResponse {
            id: r.id.0,
            employee_id: r.employee_id.0,
            start_date: r.start_date,
            end_date: r.end_date,
            leave_type: r.leave_type,
            comments: r.comments,
            status: r.status.to_string(),
            created_at: r.created_at,
            approver_id: r.approver_id.map(|id| id.0),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub total: usize,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitLeaveResponse {
    #[schema(example = "Leave request submitted")]
    pub message: String,
    pub data: LeaveResponse,
    /// users who received a notification
    #[schema(example = json!([7, 9]))]
    pub notified: Vec<u64>,
    /// true when a notification or push could not be delivered
    pub degraded: bool,
    #[schema(value_type = Vec<Object>, example = json!([{"kind": "push_failed", "user_id": 7, "reason": "push channel unavailable"}]))]
    pub warnings: Vec<DeliveryWarning>,
}

#[derive(Serialize, ToSchema)]
pub struct DecisionResponse {
    #[schema(example = "Leave approved")]
    pub message: String,
    pub data: LeaveResponse,
    #[schema(example = 31, nullable = true)]
    pub notification_id: Option<u64>,
    pub audit_email_sent: bool,
    pub degraded: bool,
    #[schema(value_type = Vec<Object>, example = json!([{"kind": "audit_email_failed", "reason": "mail relay rejected the message with status 502"}]))]
    pub warnings: Vec<DeliveryWarning>,
}

impl DecisionResponse {
    fn new(message: &str, outcome: DecisionOutcome) -> Self {
        let degraded = outcome.degraded();
        DecisionResponse {
            message: message.to_owned(),
            data: outcome.request.into(),
            notification_id: outcome.notification.map(|n| n.id.0),
            audit_email_sent: outcome.audit_email_sent,
            degraded,
            warnings: outcome.warnings,
        }
    }
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = SubmitLeaveResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an employee"),
        (status = 503, description = "Store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
#[instrument(name = "create_leave", skip_all, fields(user_id = auth.user_id.0))]
pub async fn create_leave(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let outcome = workflow
        .submit_request(&auth.caller(), payload.into_inner().into())
        .await?;

    let degraded = outcome.degraded();
    if degraded {
        tracing::warn!(
            leave_id = outcome.request.id.0,
            warnings = ?outcome.warnings,
            "Submitted with degraded delivery"
        );
    }

    Ok(HttpResponse::Created().json(SubmitLeaveResponse {
        message: "Leave request submitted".into(),
        data: outcome.request.into(),
        notified: outcome.notified.iter().map(|id| id.0).collect(),
        degraded,
        warnings: outcome.warnings,
    }))
}

/* =========================
Approve leave (Manager/Supervisor/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved", body = DecisionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed", body = Object, example = json!({
            "error": "invalid_state",
            "message": "leave request 1 is already approved"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = LeaveRequestId(path.into_inner());

    let outcome = workflow
        .decide_request(&auth.caller(), leave_id, Decision::Approve, None)
        .await?;

    Ok(HttpResponse::Ok().json(DecisionResponse::new("Leave approved", outcome)))
}

/* =========================
Reject leave (Manager/Supervisor/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body(content = DecisionBody, description = "Optional rejection reason"),
    responses(
        (status = 200, description = "Leave rejected", body = DecisionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
    path: web::Path<u64>,
    body: Option<web::Json<DecisionBody>>,
) -> actix_web::Result<impl Responder> {
    let leave_id = LeaveRequestId(path.into_inner());
    let comments = body.and_then(|b| b.into_inner().comments);

    let outcome = workflow
        .decide_request(&auth.caller(), leave_id, Decision::Reject, comments)
        .await?;

    Ok(HttpResponse::Ok().json(DecisionResponse::new("Leave rejected", outcome)))
}

/* =========================
Withdraw leave (owner, while pending)
========================= */
#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to withdraw")
    ),
    responses(
        (status = 200, description = "Leave request withdrawn", body = Object, example = json!({
            "message": "Leave request withdrawn",
            "id": 1
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Request belongs to another employee"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
#[instrument(name = "withdraw_leave", skip_all, fields(user_id = auth.user_id.0))]
pub async fn withdraw_leave(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = LeaveRequestId(path.into_inner());
    let withdrawn = workflow.withdraw_request(&auth.caller(), leave_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request withdrawn",
        "id": withdrawn.id,
    })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Request belongs to another employee"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = LeaveRequestId(path.into_inner());
    let leave = workflow.get_request(&auth.caller(), leave_id).await?;

    Ok(HttpResponse::Ok().json(LeaveResponse::from(leave)))
}

/// Approvers see every request, everyone else only their own.
#[utoipa::path(
    get,
    path = "/api/leave",
    responses(
        (status = 200, description = "Leave requests, newest first", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
) -> actix_web::Result<impl Responder> {
    let leaves = workflow.list_requests(&auth.caller()).await?;

    let data: Vec<LeaveResponse> = leaves.into_iter().map(LeaveResponse::from).collect();
    Ok(HttpResponse::Ok().json(LeaveListResponse {
        total: data.len(),
        data,
    }))
}
