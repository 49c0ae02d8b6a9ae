use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub supabase: SupabaseConfig,
    pub twilio: TwilioConfig,
    pub smtp: SmtpConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Base URL Twilio uses to reach our webhooks
    pub public_app_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub messaging_rate_limit_per_minute: u32,
    pub max_request_size_bytes: usize,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    #[serde(skip_serializing)]
    pub cron_secret: Option<String>,
    #[serde(skip_serializing)]
    pub debug_secret: Option<String>,
    pub admin_emails: Vec<String>,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub service_role_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub phone_number: Option<String>,
    pub whatsapp_number: Option<String>,
    pub deadline_flow_sid: Option<String>,
    pub api_base: String,
    pub studio_base: String,
    pub content_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub pass: Option<String>,
    pub from_name: String,
    pub from_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    pub ttl_secs: u64,
    pub max_events: usize,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server
        if let Some(port) = first_env(&["HAPPY_CRM_PORT", "PORT"]).and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = first_env(&["PUBLIC_APP_URL", "NEXT_PUBLIC_APP_URL"]) {
            self.server.public_app_url = Some(v.trim_end_matches('/').to_string());
        }

        // Database
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        override_parsed(&mut self.database.max_connections, "DATABASE_MAX_CONNECTIONS");
        override_parsed(&mut self.database.connection_timeout, "DATABASE_CONNECTION_TIMEOUT");

        // API
        override_parsed(&mut self.api.messaging_rate_limit_per_minute, "API_MESSAGING_RATE_LIMIT");
        override_parsed(&mut self.api.max_request_size_bytes, "API_MAX_REQUEST_SIZE_BYTES");

        // Security
        if let Ok(v) = env::var("SUPABASE_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = first_env(&["CRON_SECRET", "CRON_API_TOKEN"]) {
            self.security.cron_secret = Some(v);
        }
        if let Ok(v) = env::var("DEBUG_SECRET") {
            self.security.debug_secret = Some(v);
        }
        if let Ok(v) = env::var("ADMIN_EMAILS") {
            self.security.admin_emails = split_list(&v);
        }
        override_parsed(&mut self.security.enable_cors, "SECURITY_ENABLE_CORS");
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        // Supabase
        if let Some(v) = first_env(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.supabase.url = Some(v.trim_end_matches('/').to_string());
        }
        if let Ok(v) = env::var("SUPABASE_SERVICE_ROLE_KEY") {
            self.supabase.service_role_key = Some(v);
        }

        // Twilio
        if let Ok(v) = env::var("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = Some(v);
        }
        if let Ok(v) = env::var("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = Some(v);
        }
        if let Ok(v) = env::var("TWILIO_PHONE_NUMBER") {
            self.twilio.phone_number = Some(v);
        }
        if let Ok(v) = env::var("TWILIO_WHATSAPP_NUMBER") {
            self.twilio.whatsapp_number = Some(v);
        }
        if let Ok(v) = env::var("TWILIO_DEADLINE_FLOW_SID") {
            self.twilio.deadline_flow_sid = Some(v);
        }

        // SMTP
        if let Ok(v) = env::var("SMTP_HOST") {
            self.smtp.host = Some(v);
        }
        override_parsed(&mut self.smtp.port, "SMTP_PORT");
        if let Ok(v) = env::var("SMTP_USER") {
            self.smtp.user = Some(v);
        }
        if let Ok(v) = env::var("SMTP_PASS") {
            self.smtp.pass = Some(v);
        }
        if let Ok(v) = env::var("SMTP_FROM_NAME") {
            self.smtp.from_name = v;
        }
        if let Ok(v) = env::var("SMTP_FROM_EMAIL") {
            self.smtp.from_email = Some(v);
        }

        // Event buffer
        override_parsed(&mut self.events.ttl_secs, "EVENTS_TTL_SECS");
        override_parsed(&mut self.events.max_events, "EVENTS_MAX");
        override_parsed(&mut self.events.sweep_interval_secs, "EVENTS_SWEEP_INTERVAL_SECS");

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                public_app_url: Some("http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                messaging_rate_limit_per_minute: 10,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                default_page_size: 50,
                max_page_size: 500,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                cron_secret: None,
                debug_secret: None,
                admin_emails: default_admin_emails(),
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            supabase: SupabaseConfig::default(),
            twilio: TwilioConfig::default(),
            smtp: SmtpConfig::default(),
            events: EventsConfig::default(),
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.server.public_app_url = None;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.api.max_request_size_bytes = 5 * 1024 * 1024; // 5MB
        config.security.cors_origins = Vec::new();
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.public_app_url = None;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.api.max_request_size_bytes = 2 * 1024 * 1024; // 2MB
        config.api.max_page_size = 100;
        config.security.cors_origins = Vec::new();
        config
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_role_key: None,
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            phone_number: None,
            whatsapp_number: None,
            deadline_flow_sid: None,
            api_base: "https://api.twilio.com/2010-04-01".to_string(),
            studio_base: "https://studio.twilio.com/v2".to_string(),
            content_base: "https://content.twilio.com/v1".to_string(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            user: None,
            pass: None,
            from_name: "Happy CRM".to_string(),
            from_email: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            max_events: 1000,
            sweep_interval_secs: 60,
        }
    }
}

fn default_admin_emails() -> Vec<String> {
    vec!["admin@happy-crm.com".to_string(), "test@happy-crm.com".to_string()]
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

fn override_parsed<T: FromStr>(field: &mut T, name: &str) {
    if let Some(parsed) = env::var(name).ok().and_then(|v| v.trim().parse().ok()) {
        *field = parsed;
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.events.max_events, 1000);
        assert_eq!(config.events.ttl_secs, 300);
        assert!(config.security.cron_secret.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.is_production());
        assert_eq!(config.api.max_page_size, 100);
        assert!(config.security.cors_origins.is_empty());
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(
            split_list(" a@x.com, ,b@y.com ,"),
            vec!["a@x.com".to_string(), "b@y.com".to_string()]
        );
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "super-secret".to_string();
        config.twilio.auth_token = Some("twilio-secret".to_string());
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("twilio-secret"));
    }
}
