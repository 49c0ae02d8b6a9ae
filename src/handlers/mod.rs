// handlers/mod.rs - Tiered handler layout
//
// Public (no auth) → Webhooks (provider callbacks) → Cron (shared secret)
// → Protected (session token) → Elevated (admin role or allow-listed e-mail)
// → Debug (debug secret)
pub mod cron;
pub mod debug;
pub mod elevated;
pub mod protected;
pub mod public;
pub mod webhooks;
