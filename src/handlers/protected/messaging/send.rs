use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::required_text;
use crate::database::models::activity::preview;
use crate::database::models::{LeadContact, NewActivity, NewMessage};
use crate::database::{ActivityLog, LeadRepository, MessageRepository, SentEmail};
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::email::{looks_like_email, OutgoingEmail};
use crate::services::phone::{format_phone_number, Channel};
use crate::services::twilio::{positional_variables, OutboundMessage, SentMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsSendRequest {
    pub lead_id: Option<Uuid>,
    pub to: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppSendRequest {
    pub lead_id: Option<Uuid>,
    pub to: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub template_sid: Option<String>,
    pub template_variables: Option<Map<String, Value>>,
    pub media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSendRequest {
    pub lead_id: Option<Uuid>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub message_id: String,
    pub status: String,
    pub channel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// A validated WhatsApp send: what goes to Twilio and what we store as the body
#[derive(Debug, PartialEq)]
pub struct WhatsAppPlan {
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub content_sid: Option<String>,
    pub template_params: Option<std::collections::BTreeMap<String, String>>,
    pub stored_body: String,
}

pub fn plan_whatsapp(request: &WhatsAppSendRequest) -> Result<WhatsAppPlan, ApiError> {
    let content = request.content.as_deref().filter(|c| !c.trim().is_empty());
    let media_url = request.media_url.as_deref().filter(|m| !m.trim().is_empty());

    match (request.kind.as_deref(), request.template_sid.as_deref().filter(|s| !s.is_empty())) {
        (Some("template"), Some(template_sid)) => Ok(WhatsAppPlan {
            body: None,
            media_url: None,
            content_sid: Some(template_sid.to_string()),
            template_params: request.template_variables.as_ref().map(positional_variables),
            stored_body: format!("Template: {}", template_sid),
        }),
        (Some("text"), _) if content.is_some() || media_url.is_some() => Ok(WhatsAppPlan {
            body: content.map(str::to_string),
            media_url: media_url.map(str::to_string),
            content_sid: None,
            template_params: None,
            stored_body: content.unwrap_or("Media message").to_string(),
        }),
        _ => Err(ApiError::bad_request("Invalid message type or missing content")),
    }
}

async fn load_lead(state: &AppState, lead_id: Option<Uuid>) -> Result<LeadContact, ApiError> {
    let lead_id = lead_id.ok_or_else(|| ApiError::invalid_field("leadId", "Lead ID is required"))?;
    Ok(LeadRepository::new(state.pool()).contact(lead_id).await?)
}

/// Persist an outbound Twilio message; the send already happened, so a failed
/// insert is only logged
async fn store_outbound(
    state: &AppState,
    lead: &LeadContact,
    channel: Channel,
    sent: &SentMessage,
    body: String,
    media_url: Option<String>,
    sender: Uuid,
) {
    let message = NewMessage {
        lead_id: Some(lead.id),
        channel: channel.as_str(),
        direction: "outbound",
        body,
        media_url,
        twilio_message_sid: Some(sent.sid.clone()),
        status: sent.status.clone(),
        sender_id: Some(sender),
    };
    if let Err(e) = MessageRepository::new(state.pool()).insert(&message).await {
        tracing::warn!(lead_id = %lead.id, message_sid = %sent.sid, "Failed to save outbound message: {}", e);
    }
}

/// POST /api/messaging/sms/send
pub async fn send_sms(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<SmsSendRequest>,
) -> ApiResult<SendResult> {
    let to = required_text("to", request.to.as_deref())?;
    let content = required_text("content", request.content.as_deref())?;
    let lead = load_lead(&state, request.lead_id).await?;

    let formatted = format_phone_number(to);
    let sent = state
        .telephony
        .send_message(
            Channel::Sms,
            OutboundMessage {
                to: formatted.clone(),
                body: Some(content.to_string()),
                ..OutboundMessage::default()
            },
        )
        .await?;

    store_outbound(&state, &lead, Channel::Sms, &sent, content.to_string(), None, user.user_id).await;
    ActivityLog::new(state.pool())
        .record(
            NewActivity::for_lead(lead.id, "sms_sent", "SMS message sent")
                .by(user.user_id)
                .with_details(json!({
                    "message_sid": sent.sid,
                    "to": formatted,
                    "content_preview": preview(content, 100),
                })),
        )
        .await;

    Ok(ApiResponse::success(SendResult {
        message_id: sent.sid,
        status: sent.status,
        channel: Channel::Sms.as_str(),
        response: None,
    }))
}

/// POST /api/messaging/whatsapp/send
///
/// `type: "template"` needs `templateSid` (variables are sent positionally);
/// `type: "text"` needs `content` or `mediaUrl`.
pub async fn send_whatsapp(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<WhatsAppSendRequest>,
) -> ApiResult<SendResult> {
    let to = required_text("to", request.to.as_deref())?;
    let lead = load_lead(&state, request.lead_id).await?;
    let plan = plan_whatsapp(&request)?;

    let formatted = format_phone_number(to);
    let sent = state
        .telephony
        .send_message(
            Channel::WhatsApp,
            OutboundMessage {
                to: formatted.clone(),
                body: plan.body,
                media_url: plan.media_url.clone(),
                content_sid: plan.content_sid.clone(),
                content_variables: plan.template_params,
            },
        )
        .await?;

    store_outbound(
        &state,
        &lead,
        Channel::WhatsApp,
        &sent,
        plan.stored_body.clone(),
        plan.media_url,
        user.user_id,
    )
    .await;
    ActivityLog::new(state.pool())
        .record(
            NewActivity::for_lead(lead.id, "whatsapp_sent", "WhatsApp message sent")
                .by(user.user_id)
                .with_details(json!({
                    "message_sid": sent.sid,
                    "to": formatted,
                    "template_sid": plan.content_sid,
                    "content_preview": preview(&plan.stored_body, 100),
                })),
        )
        .await;

    Ok(ApiResponse::success(SendResult {
        message_id: sent.sid,
        status: sent.status,
        channel: Channel::WhatsApp.as_str(),
        response: None,
    }))
}

/// POST /api/messaging/email/send
pub async fn send_email(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<EmailSendRequest>,
) -> ApiResult<SendResult> {
    let to = required_text("to", request.to.as_deref())?;
    let subject = required_text("subject", request.subject.as_deref())?;
    let content = required_text("content", request.content.as_deref())?;
    if !looks_like_email(to) {
        return Err(ApiError::invalid_field("to", "Invalid email address"));
    }
    let lead = load_lead(&state, request.lead_id).await?;

    let receipt = state
        .mailer
        .send(OutgoingEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            content: content.to_string(),
            recipient_name: Some(lead.lead_name.clone()),
        })
        .await?;

    let saved = MessageRepository::new(state.pool())
        .insert_email(&SentEmail {
            lead_id: lead.id,
            message_id: &receipt.message_id,
            to_email: to,
            subject,
            content,
            smtp_response: &receipt.response,
        })
        .await;
    if let Err(e) = saved {
        tracing::warn!(lead_id = %lead.id, "Failed to save email message: {}", e);
    }

    ActivityLog::new(state.pool())
        .record(
            NewActivity::for_lead(lead.id, "email_sent", format!("Email sent: {}", subject))
                .by(user.user_id)
                .with_details(json!({
                    "message_id": receipt.message_id,
                    "to": to,
                    "subject": subject,
                    "content_preview": preview(content, 200),
                })),
        )
        .await;

    Ok(ApiResponse::success(SendResult {
        message_id: receipt.message_id,
        status: "sent".to_string(),
        channel: "email",
        response: Some(receipt.response),
    }))
}
