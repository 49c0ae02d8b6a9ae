pub mod history;
pub mod notes;
pub mod send;

pub use history::message_history;
pub use notes::{list_notes, save_note};
pub use send::{send_email, send_sms, send_whatsapp};

use crate::error::ApiError;

/// Trimmed, non-empty request field
pub fn required_text<'r>(field: &str, value: Option<&'r str>) -> Result<&'r str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::invalid_field(field, format!("{} is required", field)))
}
