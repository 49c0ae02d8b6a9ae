use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::messaging::required_text;
use crate::database::MessageRepository;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::twilio::ContentTemplate;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TemplateList {
    pub templates: Vec<ContentTemplate>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedTemplate {
    pub sid: String,
    pub name: String,
    pub content: String,
    pub language: String,
    pub status: &'static str,
    /// False when the local copy could not be written
    pub saved_locally: bool,
}

/// GET /api/templates/sync - Twilio Content templates
pub async fn list_templates(State(state): State<AppState>) -> ApiResult<TemplateList> {
    let templates = state.telephony.list_templates().await?;
    Ok(ApiResponse::success(TemplateList {
        count: templates.len(),
        templates,
    }))
}

/// POST /api/templates/sync - create a plain-text template, then keep a local copy
pub async fn create_template(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTemplateRequest>,
) -> ApiResult<CreatedTemplate> {
    let name = required_text("name", request.name.as_deref())?;
    let content = required_text("content", request.content.as_deref())?;
    let language = request.language.as_deref().filter(|l| !l.is_empty()).unwrap_or("tr");

    let sid = state.telephony.create_text_template(name, content, language).await?;
    tracing::info!(sid = %sid, name, "Created content template");

    let saved_locally = match MessageRepository::new(state.pool())
        .insert_template(name, content, &sid, language)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(sid = %sid, "Failed to save template locally: {}", e);
            false
        }
    };

    Ok(ApiResponse::created(CreatedTemplate {
        sid,
        name: name.to_string(),
        content: content.to_string(),
        language: language.to_string(),
        status: "pending",
        saved_locally,
    }))
}
