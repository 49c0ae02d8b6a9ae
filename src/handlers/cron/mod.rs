// handlers/cron/mod.rs - Scheduler entry points
//
// Guarded by `cron_secret_middleware`; the token comes as a Bearer header or
// the `token` query parameter.
pub mod deadlines;

pub use deadlines::{check_transfer_deadlines, next_deadline};
