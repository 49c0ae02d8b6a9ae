pub mod deadline_advisor;
pub mod deadline_monitor;
pub mod email;
pub mod message_events;
pub mod phone;
pub mod supabase_admin;
pub mod twilio;

pub use deadline_advisor::NextDeadlineInfo;
pub use email::{Mailer, OutgoingEmail, SentReceipt, SmtpMailer};
pub use message_events::{EventBuffer, EventKind, MessageEvent};
pub use supabase_admin::SupabaseAdmin;
pub use twilio::{Telephony, TwilioClient};

/// Failures talking to Twilio or the SMTP relay
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Provider error {code:?}: {message}")]
    Provider { code: Option<i64>, message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SMTP error: {0}")]
    Smtp(String),
}
