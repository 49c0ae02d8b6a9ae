pub mod admin;
pub mod auth;
pub mod rate_limit;
pub mod response;
pub mod secret;

pub use admin::require_admin_middleware;
pub use auth::{session_auth_middleware, AuthUser};
pub use rate_limit::messaging_rate_limit_middleware;
pub use response::{ApiJson, ApiResponse, ApiResult};
pub use secret::cron_secret_middleware;
