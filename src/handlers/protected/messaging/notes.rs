use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::required_text;
use crate::database::models::activity::preview;
use crate::database::models::{LeadNote, NewActivity};
use crate::database::{ActivityLog, LeadRepository, NoteRepository};
use crate::error::ApiError;
use crate::handlers::protected::page_bounds;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveNoteRequest {
    pub lead_id: Option<Uuid>,
    pub content: Option<String>,
    #[serde(alias = "note_type")]
    pub note_type: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesQuery {
    pub lead_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/messaging/note/save
pub async fn save_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<SaveNoteRequest>,
) -> ApiResult<LeadNote> {
    let lead_id = request
        .lead_id
        .ok_or_else(|| ApiError::invalid_field("leadId", "Lead ID is required"))?;
    let content = required_text("content", request.content.as_deref())?;
    let note_type = request.note_type.as_deref().unwrap_or("manual");
    let visibility = request.visibility.as_deref().unwrap_or("internal");

    let lead = LeadRepository::new(state.pool()).contact(lead_id).await?;
    let note = NoteRepository::new(state.pool())
        .insert(lead.id, content, note_type, visibility, user.user_id)
        .await?;

    ActivityLog::new(state.pool())
        .record(
            NewActivity::for_lead(lead.id, "note_added", format!("Note added: {}", note_type))
                .by(user.user_id)
                .with_details(json!({
                    "note_id": note.id,
                    "content_preview": preview(content, 100),
                    "note_type": note_type,
                    "visibility": visibility,
                })),
        )
        .await;

    Ok(ApiResponse::created(note))
}

/// GET /api/messaging/note/save?leadId&limit&offset
pub async fn list_notes(State(state): State<AppState>, Query(query): Query<NotesQuery>) -> ApiResult<Vec<LeadNote>> {
    let lead_id = query
        .lead_id
        .ok_or_else(|| ApiError::invalid_field("leadId", "Lead ID is required"))?;
    let (limit, offset) = page_bounds(query.limit, query.offset, &state.config.api);

    let notes = NoteRepository::new(state.pool()).for_lead(lead_id, limit, offset).await?;
    Ok(ApiResponse::success(notes))
}
