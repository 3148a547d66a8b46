use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::conversation::{ChatState, TranscriptEntry};
use crate::events::{ChatEvent, ConversationMode, TurnOutcome};
use crate::server::{ApiError, Result, ServerState};

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/conversations", post(create_conversation))
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/api/conversations/{id}/attachments", post(upload_attachment))
        .route("/api/conversations/{id}/messages", post(send_message))
        .route("/api/conversations/{id}/reset", post(reset_conversation))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: Uuid,
    pub mode: ConversationMode,
    pub session_active: bool,
    pub session_id: Option<Uuid>,
    pub pending_attachment: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TurnOutcome>,
}

impl ConversationView {
    fn new(id: Uuid, mode: ConversationMode, state: &ChatState, outcome: Option<TurnOutcome>) -> Self {
        Self {
            id,
            mode,
            session_active: state.sessions.is_active(),
            session_id: state.sessions.current().map(|session| session.id()),
            pending_attachment: state.pending.as_ref().map(|a| a.name.clone()),
            transcript: state.history.entries().to_vec(),
            outcome,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "healthy": true, "version": env!("CARGO_PKG_VERSION") }))
}

async fn create_conversation(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<ConversationView>) {
    let id = state.create_conversation().await;
    let view = ConversationView::new(id, state.controller.settings().mode, &ChatState::new(), None);
    (StatusCode::CREATED, Json(view))
}

async fn get_conversation(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationView>> {
    let conversation = state.conversation(id).await?;
    let chat = conversation.lock().await;
    Ok(Json(ConversationView::new(id, state.controller.settings().mode, &chat, None)))
}

async fn delete_conversation(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.remove_conversation(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn upload_attachment(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ConversationView>> {
    let conversation = state.conversation(id).await?;

    let mut received = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read file: {}", e)))?;
        received = Some((name, bytes));
        break;
    }

    let (name, bytes) = received.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".to_string()))?;
    if bytes.len() > state.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "{} is {} bytes, the limit is {}",
            name,
            bytes.len(),
            state.max_upload_bytes
        )));
    }

    let path = state.storage.stage_upload(id, &name, &bytes).await?;

    let mut chat = conversation.lock().await;
    let outcome = run_event(&state, &mut chat, ChatEvent::AttachFile { path, name }).await;
    Ok(Json(ConversationView::new(id, state.controller.settings().mode, &chat, Some(outcome))))
}

async fn send_message(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ConversationView>> {
    let conversation = state.conversation(id).await?;
    let mut chat = conversation.lock().await;
    let outcome = run_event(&state, &mut chat, ChatEvent::Submit { text: req.text }).await;
    Ok(Json(ConversationView::new(id, state.controller.settings().mode, &chat, Some(outcome))))
}

async fn reset_conversation(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationView>> {
    let conversation = state.conversation(id).await?;
    let mut chat = conversation.lock().await;
    let outcome = run_event(&state, &mut chat, ChatEvent::Reset).await;
    Ok(Json(ConversationView::new(id, state.controller.settings().mode, &chat, Some(outcome))))
}

/// Dispatch one event and delete the staged copy of an attachment that is no longer pending.
async fn run_event(state: &ServerState, chat: &mut ChatState, event: ChatEvent) -> TurnOutcome {
    let staged = chat.pending.as_ref().map(|attachment| attachment.path.clone());
    let outcome = state.controller.dispatch(chat, event).await;

    if let Some(path) = staged {
        let still_pending = chat.pending.as_ref().is_some_and(|attachment| attachment.path == path);
        if !still_pending {
            if let Err(e) = state.storage.remove_staged(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove staged upload");
            }
        }
    }

    outcome
}
