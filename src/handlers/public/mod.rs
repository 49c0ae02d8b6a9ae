// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service descriptor and health probe used by load balancers and uptime checks.
pub mod system;

pub use system::{health, root};
