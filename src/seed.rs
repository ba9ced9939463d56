use anyhow::{Context, Result};

use crate::auth::password::hash_password;
use crate::model::{NewUser, Role};
use crate::store::UserStore;

/// Creates the bootstrap admin (ADMIN + EMPLOYEE) unless the email is taken.
pub async fn seed_admin(users: &dyn UserStore, email: &str, password: &str) -> Result<()> {
    let email = email.trim().to_lowercase();
    if users.find_user_by_email(&email).await?.is_some() {
        tracing::debug!(%email, "Seed admin already present");
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("hashing seed password: {e}"))?;
    let admin = users
        .create_user(NewUser {
            display_name: "System Admin".into(),
            email,
            password_hash,
            roles: [Role::Admin, Role::Employee].into(),
        })
        .await
        .context("creating seed admin")?;

    tracing::info!(user_id = admin.id.0, "Seed admin created");
    Ok(())
}
