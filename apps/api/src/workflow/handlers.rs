//! Axum route handlers for the session workflow API.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{Attachment, MAX_ATTACHMENT_BYTES};
use crate::state::AppState;
use crate::workflow::machine::{Event, Snapshot, WorkflowError};
use crate::workflow::session::Session;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub index: Option<usize>,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load(state: &AppState, id: Uuid) -> Result<Arc<Session>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

fn respond(session: &Session) -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: session.id,
        snapshot: session.snapshot(),
    })
}

/// Dispatches an event and answers with the snapshot right after the
/// transition. Oracle calls keep running; clients poll for their outcome.
async fn apply(
    state: &AppState,
    id: Uuid,
    event: Event,
) -> Result<Json<SessionResponse>, AppError> {
    let session = load(state, id).await?;
    session.dispatch(event)?;
    Ok(respond(&session))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionResponse>) {
    let session = state.sessions.create(state.oracle.clone()).await;
    (StatusCode::CREATED, respond(&session))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = load(&state, id).await?;
    Ok(respond(&session))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// PUT /api/v1/sessions/:id/resume/text
pub async fn handle_set_resume_text(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TextRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::EditResumeText(req.text)).await
}

/// POST /api/v1/sessions/:id/resume/file
///
/// Takes the first multipart field that carries a file name.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;

        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(AppError::Validation(format!(
                "Uploaded file exceeds {MAX_ATTACHMENT_BYTES} bytes"
            )));
        }

        let attachment = Attachment::from_bytes(file_name, &content_type, &bytes)
            .ok_or_else(|| WorkflowError::UnsupportedAttachment(content_type.clone()))?;
        return apply(&state, id, Event::AttachResume(attachment)).await;
    }

    Err(AppError::Validation(
        "Multipart body has no file field".to_string(),
    ))
}

/// PUT /api/v1/sessions/:id/job
pub async fn handle_set_job_text(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TextRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::EditJobText(req.text)).await
}

/// POST /api/v1/sessions/:id/discover
pub async fn handle_open_discovery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::OpenDiscovery).await
}

/// POST /api/v1/sessions/:id/input
pub async fn handle_show_input(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::ShowInput).await
}

/// POST /api/v1/sessions/:id/search
pub async fn handle_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::Search(req.query)).await
}

/// POST /api/v1/sessions/:id/postings/:index/select
pub async fn handle_select_posting(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::SelectPosting(index)).await
}

/// POST /api/v1/sessions/:id/analyze
///
/// Returns immediately in the analyzing step; the analysis can take minutes.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::Analyze).await
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::Reset).await
}

/// PUT /api/v1/sessions/:id/selection
pub async fn handle_select_bullet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    apply(&state, id, Event::SelectBullet(req.index)).await
}
