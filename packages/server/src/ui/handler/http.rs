//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    domain::ProjectId,
    infrastructure::dto::http::{MessageDto, MessageHistoryDto, MessageHistoryQuery},
    ui::{middleware::AuthenticatedUser, state::AppState},
    usecase::HistoryError,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Messages of a project stored between `since` and `until` (default: now)
pub async fn get_message_history(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(requester)): Extension<AuthenticatedUser>,
    Path(project_id): Path<u64>,
    Query(query): Query<MessageHistoryQuery>,
) -> Result<Json<MessageHistoryDto>, StatusCode> {
    let project_id = ProjectId::new(project_id);
    match state
        .get_message_history_usecase
        .execute(requester, project_id, query.since, query.until)
        .await
    {
        Ok(messages) => {
            // Domain Model から DTO への変換
            let history = MessageHistoryDto {
                project_id: project_id.value(),
                messages: messages.into_iter().map(MessageDto::from).collect(),
            };
            Ok(Json(history))
        }
        Err(HistoryError::Forbidden) => {
            tracing::warn!(
                "User {} is not a member of project {}",
                requester,
                project_id
            );
            Err(StatusCode::FORBIDDEN)
        }
        Err(HistoryError::InvalidRange) => Err(StatusCode::BAD_REQUEST),
        Err(e) => {
            tracing::error!("Failed to load history of project {}: {}", project_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
