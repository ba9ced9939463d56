use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

use crate::workflow::{RoutingPolicy, WorkflowSettings};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Approval workflow
    pub audit_email: String,
    pub routing_policy: RoutingPolicy,
    pub collaborator_timeout_ms: u64,
    pub push_buffer: usize,

    // Outbound mail
    pub mail_from: String,
    pub mail_relay_url: Option<String>,

    // First admin account, created at startup when missing
    pub seed_admin_email: Option<String>,
    pub seed_admin_password: Option<String>,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("{key} has invalid value `{raw}`: {e}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", "900")?, // default 15 min

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: parsed("RATE_REGISTER_PER_MIN", "30")?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            audit_email: env::var("AUDIT_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string()),
            routing_policy: parsed("ROUTING_POLICY", "fanout")?,
            collaborator_timeout_ms: parsed("COLLABORATOR_TIMEOUT_MS", "5000")?,
            push_buffer: parsed("PUSH_BUFFER", "64")?,

            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@leave.local".to_string()),
            mail_relay_url: optional("MAIL_RELAY_URL"),

            seed_admin_email: optional("SEED_ADMIN_EMAIL"),
            seed_admin_password: optional("SEED_ADMIN_PASSWORD"),
        })
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            audit_email: self.audit_email.clone(),
            routing: self.routing_policy,
            collaborator_timeout: self.collaborator_timeout(),
        }
    }
}
