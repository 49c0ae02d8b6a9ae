use std::collections::HashMap;

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::{form_text, form_value, parse_form};
use crate::database::models::{LeadContact, NewMessage};
use crate::database::{DatabaseError, LeadRepository, MessageRepository};
use crate::services::phone::{detect_channel, normalize_phone_number, phone_variants, trailing_digits};
use crate::services::twilio::map_twilio_status;
use crate::state::AppState;

/// What a Twilio messaging callback is about
#[derive(Debug, PartialEq, Eq)]
enum Callback<'f> {
    Inbound {
        sid: &'f str,
        from: &'f str,
        to: &'f str,
        body: &'f str,
    },
    Status {
        sid: &'f str,
        status: &'f str,
    },
    Ignored,
}

fn classify(form: &HashMap<String, String>) -> Callback<'_> {
    let sid = form_value(form, "MessageSid");
    let status = form_value(form, "MessageStatus");
    match (sid, form_value(form, "From"), form_text(form, "Body"), status) {
        (Some(sid), Some(from), Some(body), None) => Callback::Inbound {
            sid,
            from,
            to: form_value(form, "To").unwrap_or_default(),
            body,
        },
        (Some(sid), _, _, Some(status)) => Callback::Status { sid, status },
        _ => Callback::Ignored,
    }
}

/// POST /api/twilio/webhook
///
/// Always 200 with an empty body; Twilio retries anything else.
pub async fn twilio_webhook_post(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let form = parse_form(&body);

    let outcome = match classify(&form) {
        Callback::Inbound { sid, from, to, body } => handle_inbound(&state, &form, sid, from, to, body).await,
        Callback::Status { sid, status } => handle_status(&state, &form, sid, status).await,
        Callback::Ignored => {
            tracing::debug!("Ignoring Twilio callback without MessageSid");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        tracing::error!("Twilio webhook processing failed: {}", e);
    }
    StatusCode::OK
}

/// GET /api/twilio/webhook
pub async fn twilio_webhook_get() -> Json<Value> {
    Json(json!({
        "message": "Twilio webhook endpoint is active",
        "timestamp": chrono::Utc::now(),
    }))
}

async fn handle_inbound(
    state: &AppState,
    form: &HashMap<String, String>,
    sid: &str,
    from: &str,
    to: &str,
    body: &str,
) -> Result<(), DatabaseError> {
    let channel = detect_channel(from, to);
    let phone = normalize_phone_number(from);
    let lead = match_or_create_lead(state, &phone).await?;

    let num_media: usize = form_value(form, "NumMedia").and_then(|n| n.parse().ok()).unwrap_or(0);
    let media_url = (0..num_media)
        .find_map(|i| form_value(form, &format!("MediaUrl{}", i)))
        .map(str::to_string);

    let message = MessageRepository::new(state.pool())
        .insert(&NewMessage {
            lead_id: Some(lead.id),
            channel: channel.as_str(),
            direction: "inbound",
            body: body.to_string(),
            media_url: media_url.clone(),
            twilio_message_sid: Some(sid.to_string()),
            status: "received".to_string(),
            sender_id: None,
        })
        .await?;

    tracing::info!(
        lead_id = %lead.id,
        channel = channel.as_str(),
        message_sid = sid,
        "Stored inbound message"
    );

    state
        .events
        .new_message(lead.id, message.id, &phone, body, channel.as_str(), media_url.as_deref())
        .await;
    Ok(())
}

/// Exact variant match, then the last ten digits, then a fresh unregistered lead
async fn match_or_create_lead(state: &AppState, phone: &str) -> Result<LeadContact, DatabaseError> {
    let leads = LeadRepository::new(state.pool());

    if let Some(lead) = leads.find_by_phone_variants(&phone_variants(phone)).await? {
        return Ok(lead);
    }
    if let Some(lead) = leads.find_by_phone_suffix(&trailing_digits(phone)).await? {
        return Ok(lead);
    }

    let lead = leads.create_unregistered(&format!("+{}", phone)).await?;
    tracing::info!(lead_id = %lead.id, "Created lead for unknown sender");
    Ok(lead)
}

async fn handle_status(
    state: &AppState,
    form: &HashMap<String, String>,
    sid: &str,
    status: &str,
) -> Result<(), DatabaseError> {
    let mapped = map_twilio_status(status);
    let error_code = form_value(form, "ErrorCode");
    let error_message = form_value(form, "ErrorMessage");

    let lead_id = MessageRepository::new(state.pool())
        .update_status(sid, &mapped, error_code, error_message)
        .await?;
    if lead_id.is_none() {
        tracing::warn!(message_sid = sid, "Status callback for unknown message");
    }

    state
        .events
        .status_update(lead_id, sid, &mapped, error_code, error_message)
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_needs_sender_body_and_no_status() {
        let form = parse_form(b"MessageSid=SM1&From=%2B905551234567&To=%2B908501112233&Body=Selam");
        assert_eq!(
            classify(&form),
            Callback::Inbound {
                sid: "SM1",
                from: "+905551234567",
                to: "+908501112233",
                body: "Selam",
            }
        );
    }

    #[test]
    fn inbound_body_is_not_trimmed() {
        let form = parse_form(b"MessageSid=SM3&From=%2B905551234567&Body=++Merhaba%0A");
        match classify(&form) {
            Callback::Inbound { body, .. } => assert_eq!(body, "  Merhaba\n"),
            other => panic!("expected inbound, got {:?}", other),
        }
    }

    #[test]
    fn status_callbacks_are_recognised() {
        let form = parse_form(b"MessageSid=SM2&MessageStatus=undelivered&ErrorCode=30003&From=%2B1&Body=x");
        assert_eq!(
            classify(&form),
            Callback::Status {
                sid: "SM2",
                status: "undelivered",
            }
        );
    }

    #[test]
    fn callbacks_without_sid_are_ignored() {
        assert_eq!(classify(&parse_form(b"From=%2B1&Body=hi")), Callback::Ignored);
        assert_eq!(classify(&parse_form(b"")), Callback::Ignored);
    }
}
