//! HTTP API DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::MessagePayload;

/// Query string of the message history endpoint
#[derive(Debug, Deserialize)]
pub struct MessageHistoryQuery {
    pub since: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
}

/// One persisted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub project_id: u64,
    pub sender_id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<MessagePayload> for MessageDto {
    fn from(model: MessagePayload) -> Self {
        Self {
            project_id: model.project_id.value(),
            sender_id: model.sender_id.value(),
            content: model.content,
            created_at: model.created_at,
        }
    }
}

/// Response of the message history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHistoryDto {
    pub project_id: u64,
    pub messages: Vec<MessageDto>,
}
