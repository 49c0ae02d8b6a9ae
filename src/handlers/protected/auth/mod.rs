pub mod session;

pub use session::whoami as session_whoami;
