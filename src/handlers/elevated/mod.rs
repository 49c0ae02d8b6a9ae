// handlers/elevated/mod.rs - Admin handlers
//
// Security Level: session token plus admin role (superuser / super_admin) or
// an e-mail on the ADMIN_EMAILS allow-list
// Middleware: session_auth_middleware → require_admin_middleware
pub mod agency_users;
pub mod events;
pub mod users;

pub use agency_users::create_agency_user;
pub use events::clear_events;
pub use users::{change_user_role, create_user, delete_user, list_users};
