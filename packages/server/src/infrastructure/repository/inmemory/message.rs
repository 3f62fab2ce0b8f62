//! InMemory Message Store 実装
//!
//! ドメイン層が定義する MessageStore trait の実装。追記専用の Vec をドキュメント
//! コレクションとして使用します。ドキュメントはシリアライズ済みのバイト列として保持し、
//! 読み出し時にデコードするため、保存した内容がそのまま返ります。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{MessagePayload, MessageStore, ProjectId, StoreError};

/// 1 件分の保存済みドキュメント
#[derive(Debug, Clone)]
struct StoredDocument {
    project_id: ProjectId,
    created_at: DateTime<Utc>,
    bytes: Vec<u8>,
}

/// インメモリ Message Store 実装
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    documents: Arc<RwLock<Vec<StoredDocument>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored so far.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Every stored payload, in insertion order.
    pub async fn all(&self) -> Result<Vec<MessagePayload>, StoreError> {
        let documents = self.documents.read().await;
        documents.iter().map(decode).collect()
    }
}

fn decode(document: &StoredDocument) -> Result<MessagePayload, StoreError> {
    serde_json::from_slice(&document.bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn store(&self, payload: &MessagePayload) -> Result<bool, StoreError> {
        let bytes = serde_json::to_vec(payload).map_err(|e| StoreError::Encode(e.to_string()))?;
        let document = StoredDocument {
            project_id: payload.project_id,
            created_at: payload.created_at,
            bytes,
        };
        self.documents.write().await.push(document);
        Ok(true)
    }

    async fn messages_between(
        &self,
        project_id: ProjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MessagePayload>, StoreError> {
        let documents = self.documents.read().await;
        let mut messages = documents
            .iter()
            .filter(|doc| doc.project_id == project_id)
            .filter(|doc| doc.created_at >= from && doc.created_at <= to)
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }
}
