//! Client for the hosted auth provider's admin REST API (service-role key).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::config::SupabaseConfig;

#[derive(Debug, thiserror::Error)]
pub enum AdminApiError {
    #[error("Supabase admin API is not configured")]
    NotConfigured,
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Supabase admin API returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    pub created_at: Option<String>,
    pub last_sign_in_at: Option<String>,
    pub email_confirmed_at: Option<String>,
}

impl AdminUser {
    pub fn role(&self) -> Option<&str> {
        self.app_metadata
            .get("role")
            .and_then(Value::as_str)
            .or_else(|| self.user_metadata.get("role").and_then(Value::as_str))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAuthUser {
    pub email: String,
    pub password: String,
    pub role: String,
    pub full_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<AdminUser>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct SupabaseAdmin {
    http: reqwest::Client,
    base_url: Option<String>,
    service_key: Option<String>,
}

impl SupabaseAdmin {
    pub fn new(config: &SupabaseConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: config.url.clone(),
            service_key: config.service_role_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.service_key.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<(String, &str), AdminApiError> {
        match (self.base_url.as_deref(), self.service_key.as_deref()) {
            (Some(base), Some(key)) => Ok((format!("{}/auth/v1/admin/{}", base, path), key)),
            _ => Err(AdminApiError::NotConfigured),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AdminApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.msg.or(b.message).or(b.error_description).or(b.error))
            .unwrap_or(text);
        Err(AdminApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn list_users(&self) -> Result<Vec<AdminUser>, AdminApiError> {
        let (url, key) = self.endpoint("users")?;
        let response = self
            .http
            .get(url)
            .query(&[("page", "1"), ("per_page", "1000")])
            .header("apikey", key)
            .bearer_auth(key)
            .send()
            .await?;
        let list: UserList = Self::check(response).await?.json().await?;
        Ok(list.users)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<AdminUser, AdminApiError> {
        let wanted = email.trim().to_lowercase();
        self.list_users()
            .await?
            .into_iter()
            .find(|u| u.email.as_deref().map(str::to_lowercase).as_deref() == Some(wanted.as_str()))
            .ok_or_else(|| AdminApiError::UserNotFound(email.to_string()))
    }

    pub async fn create_user(&self, user: &NewAuthUser) -> Result<AdminUser, AdminApiError> {
        let (url, key) = self.endpoint("users")?;
        let payload = json!({
            "email": user.email,
            "password": user.password,
            "email_confirm": true,
            "app_metadata": { "role": user.role },
            "user_metadata": {
                "role": user.role,
                "full_name": user.full_name,
                "username": user.username,
            },
        });
        let response = self
            .http
            .post(url)
            .header("apikey", key)
            .bearer_auth(key)
            .json(&payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn update_password(&self, id: Uuid, password: &str) -> Result<AdminUser, AdminApiError> {
        self.update(id, json!({ "password": password, "email_confirm": true })).await
    }

    pub async fn set_role(&self, id: Uuid, role: &str) -> Result<AdminUser, AdminApiError> {
        self.update(
            id,
            json!({
                "app_metadata": { "role": role },
                "user_metadata": { "role": role },
            }),
        )
        .await
    }

    /// Delete an auth user; also rolls back a creation whose profile write failed
    pub async fn delete_user(&self, id: Uuid) -> Result<(), AdminApiError> {
        let (url, key) = self.endpoint(&format!("users/{}", id))?;
        let response = self
            .http
            .delete(url)
            .header("apikey", key)
            .bearer_auth(key)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, payload: Value) -> Result<AdminUser, AdminApiError> {
        let (url, key) = self.endpoint(&format!("users/{}", id))?;
        let response = self
            .http
            .put(url)
            .header("apikey", key)
            .bearer_auth(key)
            .json(&payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_prefers_app_metadata() {
        let user: AdminUser = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "email": "a@b.com",
            "app_metadata": { "role": "superuser" },
            "user_metadata": { "role": "agency" },
            "created_at": null,
            "last_sign_in_at": null,
            "email_confirmed_at": null
        }))
        .unwrap();
        assert_eq!(user.role(), Some("superuser"));
    }

    #[test]
    fn role_falls_back_to_user_metadata() {
        let user: AdminUser = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "email": "a@b.com",
            "user_metadata": { "role": "agency" }
        }))
        .unwrap();
        assert_eq!(user.role(), Some("agency"));
    }

    #[tokio::test]
    async fn unconfigured_client_fails_fast() {
        let admin = SupabaseAdmin::new(&SupabaseConfig::default());
        assert!(!admin.is_configured());
        assert!(matches!(admin.list_users().await, Err(AdminApiError::NotConfigured)));
    }
}
