//! Durable store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{error::StoreError, event::MessagePayload, value_object::ProjectId};

/// メッセージを追記専用コレクションに保存するストア
///
/// UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には依存しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists one payload verbatim and reports whether the store acknowledged it.
    async fn store(&self, payload: &MessagePayload) -> Result<bool, StoreError>;

    /// Messages of `project_id` created in `[from, to]`, oldest first.
    async fn messages_between(
        &self,
        project_id: ProjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MessagePayload>, StoreError>;
}
