use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Audience the hosted auth provider stamps on user session tokens
pub const SESSION_AUDIENCE: &str = "authenticated";

/// Claims of a hosted-auth session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    /// Postgres role ("authenticated"), not the application role
    #[serde(default)]
    pub role: Option<String>,
    pub aud: String,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: Option<String>, app_role: Option<&str>, ttl: Duration) -> Self {
        let now = Utc::now();
        let app_metadata = match app_role {
            Some(role) => serde_json::json!({ "role": role }),
            None => serde_json::json!({}),
        };
        Self {
            sub: user_id,
            email,
            role: Some(SESSION_AUDIENCE.to_string()),
            aud: SESSION_AUDIENCE.to_string(),
            app_metadata,
            user_metadata: serde_json::json!({}),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Application role: `app_metadata.role`, then `user_metadata.role`
    pub fn app_role(&self) -> Option<&str> {
        self.app_metadata
            .get("role")
            .and_then(Value::as_str)
            .or_else(|| self.user_metadata.get("role").and_then(Value::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Superuser,
    SuperAdmin,
    Admin,
    AgencyAdmin,
    Agency,
    User,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::Superuser,
        UserRole::SuperAdmin,
        UserRole::Admin,
        UserRole::AgencyAdmin,
        UserRole::Agency,
        UserRole::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Superuser => "superuser",
            UserRole::SuperAdmin => "super_admin",
            UserRole::Admin => "admin",
            UserRole::AgencyAdmin => "agency_admin",
            UserRole::Agency => "agency",
            UserRole::User => "user",
        }
    }

    /// Roles allowed through the admin surface
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Superuser | UserRole::SuperAdmin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing session token")]
    MissingToken,
    #[error("Authorization header must use Bearer token format")]
    MalformedHeader,
    #[error("Session secret not configured")]
    SecretNotConfigured,
    #[error("Session expired")]
    Expired,
    #[error("Invalid session token: {0}")]
    Invalid(String),
}

pub fn decode_session_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SecretNotConfigured);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[SESSION_AUDIENCE]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid(e.to_string()),
        })
}

/// Sign a session token the same way the hosted provider does; used by tests and tooling
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SecretNotConfigured);
    }
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Invalid(e.to_string()))
}

/// Admin when the role says so, or the e-mail is on the allow-list
pub fn is_admin(claims: &Claims, admin_emails: &[String]) -> bool {
    let role_allows = claims
        .app_role()
        .and_then(|role| role.parse::<UserRole>().ok())
        .is_some_and(|role| role.is_admin());
    let email_allows = claims.email.as_deref().is_some_and(|email| {
        admin_emails
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(email.trim()))
    });
    role_allows || email_allows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret-at-least-32-characters-long";

    fn claims(email: &str, role: Option<&str>) -> Claims {
        Claims::new(Uuid::new_v4(), Some(email.to_string()), role, Duration::hours(1))
    }

    #[test]
    fn token_round_trip() {
        let original = claims("agent@example.com", Some("agency"));
        let token = issue_token(&original, SECRET).unwrap();
        let decoded = decode_session_token(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, original.sub);
        assert_eq!(decoded.app_role(), Some("agency"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(&claims("a@b.com", None), SECRET).unwrap();
        let err = decode_session_token(&token, "another-secret-entirely-different").unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[test]
    fn expired_token_is_reported() {
        let mut expired = claims("a@b.com", None);
        expired.exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = issue_token(&expired, SECRET).unwrap();
        assert!(matches!(decode_session_token(&token, SECRET), Err(AuthError::Expired)));
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        assert!(matches!(
            decode_session_token("whatever", ""),
            Err(AuthError::SecretNotConfigured)
        ));
    }

    #[test]
    fn role_falls_back_to_user_metadata() {
        let mut c = claims("a@b.com", None);
        c.user_metadata = json!({ "role": "super_admin" });
        assert_eq!(c.app_role(), Some("super_admin"));
    }

    #[test]
    fn admin_by_role_or_allow_list() {
        let allow = vec!["admin@happy-crm.com".to_string()];
        assert!(is_admin(&claims("x@y.com", Some("superuser")), &allow));
        assert!(is_admin(&claims("x@y.com", Some("super_admin")), &allow));
        assert!(is_admin(&claims("Admin@Happy-CRM.com", Some("agency")), &allow));
        assert!(!is_admin(&claims("x@y.com", Some("admin")), &allow));
        assert!(!is_admin(&claims("x@y.com", None), &allow));
    }

    #[test]
    fn roles_parse_from_storage_names() {
        assert_eq!("agency_admin".parse::<UserRole>(), Ok(UserRole::AgencyAdmin));
        assert!("root".parse::<UserRole>().is_err());
    }
}
