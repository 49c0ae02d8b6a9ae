use anyhow::{bail, Context};
use serde_json::{json, Value};

use crate::auth::UserRole;
use crate::cli::utils::{generate_password, output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, UserRepository};
use crate::services::supabase_admin::{AdminApiError, AdminUser, NewAuthUser};
use crate::services::SupabaseAdmin;

const MIN_PASSWORD_LEN: usize = 8;

fn admin_client(config: &AppConfig) -> anyhow::Result<SupabaseAdmin> {
    let admin = SupabaseAdmin::new(&config.supabase);
    if !admin.is_configured() {
        bail!("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set");
    }
    Ok(admin)
}

fn user_summary(user: &AdminUser) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "role": user.role(),
        "email_confirmed_at": user.email_confirmed_at,
        "last_sign_in_at": user.last_sign_in_at,
        "created_at": user.created_at,
    })
}

fn check_password(password: &str) -> anyhow::Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {} characters", MIN_PASSWORD_LEN);
    }
    Ok(())
}

/// Mirror the account into user_profiles when a database is configured
async fn sync_profile(config: &AppConfig, user: &AdminUser, role: &str, full_name: Option<&str>) -> bool {
    if config.database.url.is_none() {
        return false;
    }
    let db = match DatabaseManager::connect_lazy(&config.database) {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!("Skipping profile sync: {}", e);
            return false;
        }
    };

    let email = user.email.as_deref().unwrap_or_default();
    let username = email.split('@').next().filter(|u| !u.is_empty());
    let synced = match UserRepository::new(db.pool())
        .upsert(user.id, email, username, full_name, role, None)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(user_id = %user.id, "Failed to sync user profile: {}", e);
            false
        }
    };
    db.close().await;
    synced
}

pub async fn check_user(config: &AppConfig, email: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let admin = admin_client(config)?;
    match admin.find_user_by_email(email).await {
        Ok(user) => output_success(&output_format, &format!("Found user {}", email), Some(user_summary(&user))),
        Err(AdminApiError::UserNotFound(_)) => {
            output_error(&output_format, &format!("No auth user with email {}", email), Some("USER_NOT_FOUND"))?;
            bail!("user not found")
        }
        Err(e) => Err(e).context("failed to look up user"),
    }
}

pub async fn set_role(config: &AppConfig, email: &str, role: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let role: UserRole = role.parse().map_err(anyhow::Error::msg)?;
    let admin = admin_client(config)?;

    let user = admin.find_user_by_email(email).await.context("failed to look up user")?;
    let updated = admin.set_role(user.id, role.as_str()).await.context("failed to update role")?;
    let profile_synced = sync_profile(config, &updated, role.as_str(), None).await;

    let mut data = user_summary(&updated);
    data["previous_role"] = json!(user.role());
    data["profile_synced"] = json!(profile_synced);
    output_success(&output_format, &format!("Role of {} set to {}", email, role), Some(data))
}

pub async fn reset_password(
    config: &AppConfig,
    email: &str,
    password: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let generated = password.is_none();
    let password = password.unwrap_or_else(generate_password);
    check_password(&password)?;
    let admin = admin_client(config)?;

    let user = admin.find_user_by_email(email).await.context("failed to look up user")?;
    admin
        .update_password(user.id, &password)
        .await
        .context("failed to update password")?;

    let mut data = json!({ "id": user.id, "email": user.email });
    if generated {
        data["password"] = json!(password);
    }
    output_success(&output_format, &format!("Password reset for {}", email), Some(data))
}

/// Create the account as superuser, or promote and repair an existing one
pub async fn ensure_superuser(
    config: &AppConfig,
    email: &str,
    password: Option<String>,
    full_name: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(password) = password.as_deref() {
        check_password(password)?;
    }
    let admin = admin_client(config)?;
    let role = UserRole::Superuser.as_str();

    let (user, created, generated_password) = match admin.find_user_by_email(email).await {
        Ok(existing) => {
            let mut user = existing;
            if user.role() != Some(role) {
                user = admin.set_role(user.id, role).await.context("failed to promote user")?;
            }
            if let Some(password) = password.as_deref() {
                user = admin
                    .update_password(user.id, password)
                    .await
                    .context("failed to update password")?;
            }
            (user, false, None)
        }
        Err(AdminApiError::UserNotFound(_)) => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(generate_password);
            let user = admin
                .create_user(&NewAuthUser {
                    email: email.trim().to_lowercase(),
                    password: password.clone(),
                    role: role.to_string(),
                    full_name: full_name.clone(),
                    username: None,
                })
                .await
                .context("failed to create user")?;
            (user, true, generated.then_some(password))
        }
        Err(e) => return Err(e).context("failed to look up user"),
    };

    let profile_synced = sync_profile(config, &user, role, full_name.as_deref()).await;

    let mut data = user_summary(&user);
    data["created"] = json!(created);
    data["profile_synced"] = json!(profile_synced);
    if let Some(password) = generated_password {
        data["password"] = json!(password);
    }
    let message = if created {
        format!("Created superuser {}", email)
    } else {
        format!("Superuser {} is up to date", email)
    };
    output_success(&output_format, &message, Some(data))
}
