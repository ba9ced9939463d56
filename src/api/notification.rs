use crate::auth::auth::AuthUser;
use crate::model::{Notification, NotificationId};
use crate::notify::PushHub;
use crate::workflow::ApprovalWorkflow;
use actix_web::{HttpResponse, Responder, http::header, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct NotificationResponse {
    #[schema(example = 31)]
    pub id: u64,
    #[schema(example = "Your leave request has been approved")]
    pub message: String,
    #[schema(example = 12, nullable = true)]
    pub leave_request_id: Option<u64>,
    #[schema(example = false)]
    pub is_read: bool,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        NotificationResponse {
            id: n.id.0,
            message: n.message,
            leave_request_id: n.leave_request_id.map(|id| id.0),
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub data: Vec<NotificationResponse>,
    #[schema(example = 2)]
    pub unread: usize,
}

/// Caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Notifications of the caller", body = NotificationListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
) -> actix_web::Result<impl Responder> {
    let notifications = workflow.list_notifications(&auth.caller()).await?;

    let unread = notifications.iter().filter(|n| !n.is_read).count();
    Ok(HttpResponse::Ok().json(NotificationListResponse {
        data: notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
        unread,
    }))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Unread notifications of the caller", body = Object, example = json!({
            "unread": 3
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Notification"
)]
pub async fn unread_count(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
) -> actix_web::Result<impl Responder> {
    let unread = workflow.unread_count(&auth.caller()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "unread": unread })))
}

/// Marking twice is fine; the second call changes nothing.
#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}/read",
    params(
        ("notification_id" = u64, Path, description = "ID of the notification to mark as read")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = NotificationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Notification belongs to another user"),
        (status = 404, description = "Notification not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    workflow: web::Data<ApprovalWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = NotificationId(path.into_inner());
    let notification = workflow
        .mark_notification_read(&auth.caller(), id)
        .await?;

    Ok(HttpResponse::Ok().json(NotificationResponse::from(notification)))
}

/// Live push as server-sent events. Each `ReceiveNotification` event carries
/// the notification as JSON.
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "text/event-stream of ReceiveNotification events"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Notification"
)]
pub async fn notification_stream(auth: AuthUser, hub: web::Data<PushHub>) -> impl Responder {
    let rx = hub.subscribe(auth.user_id).await;
    tracing::debug!(user_id = auth.user_id.0, "Push stream opened");

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let frame = web::Bytes::from(event.to_sse_frame());
                    return Some((Ok::<_, Infallible>(frame), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Push stream lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    use super::*;
    use crate::api::test_support::{Fixture, bearer};
    use crate::model::LeaveRequestId;

    fn notification_routes(cfg: &mut web::ServiceConfig) {
        cfg.service(web::resource("/notifications").route(web::get().to(list_notifications)))
            .service(
                web::resource("/notifications/unread-count").route(web::get().to(unread_count)),
            )
            .service(
                web::resource("/notifications/{id}/read").route(web::put().to(mark_read)),
            );
    }

    #[actix_web::test]
    async fn list_and_mark_read_twice() {
        let fx = Fixture::new().await;
        let delivery = fx
            .harness
            .dispatcher()
            .notify(fx.harness.employee.id, "approved", Some(LeaveRequestId(5)))
            .await
            .unwrap();
        let app = test::init_service(
            App::new()
                .configure(|cfg| fx.register(cfg))
                .configure(notification_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/notifications")
            .insert_header(bearer(&fx.config, &fx.harness.employee))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["unread"], 1);
        assert_eq!(body["data"][0]["leave_request_id"], 5);

        let uri = format!("/notifications/{}/read", delivery.notification.id);
        for _ in 0..2 {
            let req = test::TestRequest::put()
                .uri(&uri)
                .insert_header(bearer(&fx.config, &fx.harness.employee))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["is_read"], true);
        }

        let req = test::TestRequest::get()
            .uri("/notifications/unread-count")
            .insert_header(bearer(&fx.config, &fx.harness.employee))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["unread"], 0);
    }

    #[actix_web::test]
    async fn someone_elses_notification_is_forbidden() {
        let fx = Fixture::new().await;
        let delivery = fx
            .harness
            .dispatcher()
            .notify(fx.harness.employee.id, "approved", None)
            .await
            .unwrap();
        let app = test::init_service(
            App::new()
                .configure(|cfg| fx.register(cfg))
                .configure(notification_routes),
        )
        .await;

        let req = test::TestRequest::put()
            .uri(&format!("/notifications/{}/read", delivery.notification.id))
            .insert_header(bearer(&fx.config, &fx.harness.m1))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::put()
            .uri("/notifications/777/read")
            .insert_header(bearer(&fx.config, &fx.harness.m1))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
