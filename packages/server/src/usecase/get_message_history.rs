//! UseCase: プロジェクトのメッセージ履歴取得
//!
//! 要求したユーザーがプロジェクトのメンバーであることを確認してから、
//! 指定区間に保存されたメッセージを返します。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hibiki_shared::time::Clock;

use crate::domain::{MessagePayload, MessageStore, ProjectId, RecipientResolver, UserId};

use super::error::HistoryError;

/// メッセージ履歴取得のユースケース
pub struct GetMessageHistoryUseCase {
    store: Arc<dyn MessageStore>,
    resolver: Arc<dyn RecipientResolver>,
    clock: Arc<dyn Clock>,
}

impl GetMessageHistoryUseCase {
    pub fn new(
        store: Arc<dyn MessageStore>,
        resolver: Arc<dyn RecipientResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            resolver,
            clock,
        }
    }

    /// `since` から `until`（省略時は現在時刻）までのメッセージを返す
    pub async fn execute(
        &self,
        requester: UserId,
        project_id: ProjectId,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessagePayload>, HistoryError> {
        let until = until.unwrap_or_else(|| self.clock.now());
        if since > until {
            return Err(HistoryError::InvalidRange);
        }

        let members = self.resolver.members_of(project_id).await?;
        if !members.contains(&requester) {
            return Err(HistoryError::Forbidden);
        }

        Ok(self.store.messages_between(project_id, since, until).await?)
    }
}
