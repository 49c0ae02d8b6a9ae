// handlers/debug/mod.rs - Maintenance endpoints
//
// Guarded by the DEBUG_SECRET passed as the `secret` query parameter.
pub mod cleanup;

pub use cleanup::{cleanup_tables, cleanup_tables_get};
