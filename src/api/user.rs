use crate::auth::auth::AuthUser;
use crate::model::{Role, RoleSet, User, UserId};
use crate::store::UserStore;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct AssignRoles {
    /// Replaces the current set. Case does not matter.
    #[schema(example = json!(["EMPLOYEE", "MANAGER"]))]
    pub roles: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 4)]
    pub id: u64,
    #[schema(example = "Jane Doe")]
    pub display_name: String,
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[schema(example = json!(["EMPLOYEE", "MANAGER"]))]
    pub roles: Vec<String>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        UserResponse {
            id: u.id.0,
            display_name: u.display_name,
            email: u.email,
            roles: u.roles.iter().map(|r| r.to_string()).collect(),
            created_at: u.created_at,
        }
    }
}

fn parse_roles(raw: &[String]) -> Result<RoleSet, String> {
    let mut roles = RoleSet::default();
    for name in raw {
        let role = name
            .trim()
            .parse::<Role>()
            .map_err(|_| format!("Unknown role `{name}`"))?;
        roles.insert(role);
    }
    if roles.is_empty() {
        return Err("At least one role is required".into());
    }
    Ok(roles)
}

/// Admin only.
#[utoipa::path(
    put,
    path = "/api/users/{user_id}/roles",
    params(
        ("user_id" = u64, Path, description = "ID of the user whose roles are replaced")
    ),
    request_body = AssignRoles,
    responses(
        (status = 200, description = "Roles replaced", body = UserResponse),
        (status = 400, description = "Empty or unknown role"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
#[instrument(name = "assign_roles", skip(auth, users, body), fields(admin_id = auth.user_id.0))]
pub async fn assign_roles(
    auth: AuthUser,
    users: web::Data<dyn UserStore>,
    path: web::Path<u64>,
    body: web::Json<AssignRoles>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let roles = match parse_roles(&body.roles) {
        Ok(r) => r,
        Err(msg) => return Ok(HttpResponse::BadRequest().json(json!({ "error": msg }))),
    };
    let id = UserId(path.into_inner());

    match users.set_roles(id, &roles).await {
        Ok(Some(user)) => {
            info!(user_id = id.0, roles = ?roles, "Roles replaced");
            Ok(HttpResponse::Ok().json(UserResponse::from(user)))
        }
        Ok(None) => Ok(HttpResponse::NotFound().json(json!({ "error": "User not found" }))),
        Err(e) => {
            error!(error = %e, user_id = id.0, "Failed to replace roles");
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to replace roles"
            })))
        }
    }
}
