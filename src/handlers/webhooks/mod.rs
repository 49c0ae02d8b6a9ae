// handlers/webhooks/mod.rs - Provider callbacks (no session)
//
// Twilio posts application/x-www-form-urlencoded bodies; the handlers parse the
// raw body themselves so a malformed callback still gets the answer Twilio expects.
pub mod deadline_notification;
pub mod twilio;

use std::collections::HashMap;

pub use deadline_notification::{deadline_notification_get, deadline_notification_post};
pub use twilio::{twilio_webhook_get, twilio_webhook_post};

/// Decode a form body into owned key/value pairs; later duplicates win
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Form value with empty strings treated as absent
pub fn form_value<'f>(form: &'f HashMap<String, String>, key: &str) -> Option<&'f str> {
    form.get(key).map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
}

/// Like `form_value` but untrimmed; message text is stored exactly as sent
pub fn form_text<'f>(form: &'f HashMap<String, String>, key: &str) -> Option<&'f str> {
    form.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_twilio_form_bodies() {
        let form = parse_form(b"From=whatsapp%3A%2B905551234567&Body=Merhaba+d%C3%BCnya&NumMedia=0&ErrorCode=");
        assert_eq!(form_value(&form, "From"), Some("whatsapp:+905551234567"));
        assert_eq!(form_value(&form, "Body"), Some("Merhaba dünya"));
        assert_eq!(form_value(&form, "ErrorCode"), None);
        assert_eq!(form_value(&form, "Missing"), None);
    }

    #[test]
    fn message_text_keeps_its_whitespace() {
        let form = parse_form(b"Body=+%C4%B0yi+g%C3%BCnler%0A&Empty=");
        assert_eq!(form_text(&form, "Body"), Some(" İyi günler\n"));
        assert_eq!(form_value(&form, "Body"), Some("İyi günler"));
        assert_eq!(form_text(&form, "Empty"), None);
    }
}
