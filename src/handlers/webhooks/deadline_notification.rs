use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{form_value, parse_form};
use crate::database::{DatabaseError, DeadlineAnswer, TransferRepository};
use crate::services::twilio::twiml_say;
use crate::state::AppState;

const SYSTEM_ERROR_SENTENCE: &str = "Sistemde bir hata oluştu. Lütfen daha sonra tekrar deneyin.";

/// Sentence read back to the agency after their keypad answer
pub fn answer_sentence(answer: DeadlineAnswer, patient_name: Option<&str>) -> String {
    match answer {
        DeadlineAnswer::PickedUp => format!(
            "Teşekkür ederiz. {} için transfer hasta alındı olarak işaretlendi.",
            patient_name.unwrap_or("Hasta")
        ),
        DeadlineAnswer::Acknowledged => "Anladık. Transfer durumu güncellendi. İyi günler.".to_string(),
        DeadlineAnswer::NoAnswer => "Geçersiz seçim. İyi günler.".to_string(),
    }
}

fn twiml(status: StatusCode, sentence: &str) -> Response {
    (status, [(header::CONTENT_TYPE, "application/xml")], twiml_say(sentence)).into_response()
}

fn plain(status: StatusCode, text: &'static str) -> Response {
    (status, text).into_response()
}

/// POST /api/webhooks/deadline-notification
///
/// Studio flow callback carrying the DTMF digit the agency pressed.
pub async fn deadline_notification_post(State(state): State<AppState>, body: Bytes) -> Response {
    let form = parse_form(&body);

    let transfer_id = form_value(&form, "transfer_id");
    let digits = form_value(&form, "Digits");
    let call_sid = form_value(&form, "CallSid");
    let execution_sid = form_value(&form, "ExecutionSid");

    tracing::info!(
        transfer_id = transfer_id.unwrap_or("-"),
        digits = digits.unwrap_or("-"),
        call_sid = call_sid.unwrap_or("-"),
        call_status = form_value(&form, "CallStatus").unwrap_or("-"),
        "Received deadline notification webhook"
    );

    let Some(raw_id) = transfer_id else {
        tracing::error!("No transfer_id provided in webhook");
        return plain(StatusCode::BAD_REQUEST, "Transfer ID required");
    };
    let Ok(id) = Uuid::parse_str(raw_id) else {
        tracing::error!("Transfer {} not found: malformed id", raw_id);
        return plain(StatusCode::NOT_FOUND, "Transfer not found");
    };

    let repo = TransferRepository::new(state.pool());
    let transfer = match repo.find_contact(id).await {
        Ok(transfer) => transfer,
        Err(DatabaseError::NotFound(_)) => {
            tracing::error!("Transfer {} not found", id);
            return plain(StatusCode::NOT_FOUND, "Transfer not found");
        }
        Err(e) => {
            tracing::error!("Deadline notification webhook error: {}", e);
            return twiml(StatusCode::INTERNAL_SERVER_ERROR, SYSTEM_ERROR_SENTENCE);
        }
    };

    let answer = DeadlineAnswer::from_digits(digits);
    if let Err(e) = repo.apply_deadline_answer(id, answer, Utc::now()).await {
        tracing::error!("Failed to apply deadline answer to transfer {}: {}", id, e);
        // Only a confirmed answer must be persisted; a missing one is just a courtesy mark
        if answer != DeadlineAnswer::NoAnswer {
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Database update failed");
        }
    }

    match answer {
        DeadlineAnswer::PickedUp => tracing::info!("Transfer {} marked as patient_picked_up via DTMF", id),
        DeadlineAnswer::Acknowledged => tracing::info!("Transfer {} confirmed, status unchanged via DTMF", id),
        DeadlineAnswer::NoAnswer => {
            tracing::info!("No valid DTMF response for transfer {} (digits: {:?})", id, digits)
        }
    }

    let notification_status = if digits.is_some() { "confirmed" } else { "no_response" };
    if let Err(e) = repo
        .log_notification(id, "call", notification_status, call_sid.or(execution_sid))
        .await
    {
        tracing::warn!("Failed to log webhook response: {}", e);
    }

    twiml(StatusCode::OK, &answer_sentence(answer, transfer.patient_name.as_deref()))
}

/// GET /api/webhooks/deadline-notification
pub async fn deadline_notification_get() -> Json<Value> {
    Json(json!({
        "message": "Deadline notification webhook endpoint",
        "timestamp": Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_per_answer() {
        assert_eq!(
            answer_sentence(DeadlineAnswer::PickedUp, Some("Ayşe Yılmaz")),
            "Teşekkür ederiz. Ayşe Yılmaz için transfer hasta alındı olarak işaretlendi."
        );
        assert_eq!(
            answer_sentence(DeadlineAnswer::Acknowledged, Some("Ayşe Yılmaz")),
            "Anladık. Transfer durumu güncellendi. İyi günler."
        );
        assert_eq!(answer_sentence(DeadlineAnswer::NoAnswer, None), "Geçersiz seçim. İyi günler.");
    }

    #[test]
    fn twiml_reply_is_xml() {
        let response = twiml(StatusCode::OK, "Geçersiz seçim. İyi günler.");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/xml")
        );
    }
}
