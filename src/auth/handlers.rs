use crate::{
    auth::{
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    model::{NewUser, Role},
    models::{LoginReqDto, LoginResponse, RegisterReq},
    store::{StoreError, UserStore},
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::{debug, error, info, instrument};

const MIN_PASSWORD_LEN: usize = 8;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Self-service registration; every new account starts as a plain employee.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(users, user), fields(email = %user.email))]
pub async fn register(
    user: web::Json<RegisterReq>,
    users: web::Data<dyn UserStore>,
) -> impl Responder {
    let email = normalize_email(&user.email);
    let display_name = user.display_name.trim();

    if email.is_empty() || !email.contains('@') || display_name.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "A display name and a valid email are required"
        }));
    }
    if user.password.chars().count() < MIN_PASSWORD_LEN {
        return HttpResponse::BadRequest().json(json!({
            "error": format!("Password must be at least {MIN_PASSWORD_LEN} characters")
        }));
    }

    let password_hash = match hash_password(&user.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Password hashing failed");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result = users
        .create_user(NewUser {
            display_name: display_name.to_owned(),
            email,
            password_hash,
            roles: [Role::Employee].into(),
        })
        .await;

    match result {
        Ok(created) => {
            info!(user_id = created.id.0, "User registered");
            HttpResponse::Created().json(json!({
                "message": "User registered successfully",
                "id": created.id,
            }))
        }
        Err(StoreError::Conflict(_)) => HttpResponse::Conflict().json(json!({
            "error": "Email already registered"
        })),
        Err(e) => {
            error!(error = %e, "Failed to register user");
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Access token issued", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(users, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    users: web::Data<dyn UserStore>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return HttpResponse::BadRequest().body("Email or password required");
    }

    debug!("Fetching user from database");

    let db_user = match users.find_user_by_email(&normalize_email(&user.email)).await {
        Ok(Some(user)) => {
            debug!(user_id = user.id.0, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    debug!("Generating access token");

    let access_token =
        match generate_access_token(&db_user, &config.jwt_secret, config.access_token_ttl) {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Failed to sign access token");
                return HttpResponse::InternalServerError().finish();
            }
        };

    info!(user_id = db_user.id.0, "Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "Bearer".into(),
        expires_in: config.access_token_ttl,
    })
}
