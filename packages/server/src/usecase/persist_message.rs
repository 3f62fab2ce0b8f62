//! UseCase: メッセージの永続化（バックグラウンド）
//!
//! インジェストから有界キューで受け取った MessagePayload を順に `MessageStore` へ保存します。
//! 保存の失敗はログに残して破棄し、再試行しません（at-most-once）。配信経路は
//! このワーカーの成否に左右されません。

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::domain::{MessagePayload, MessageStore};

use super::error::IngestError;

/// 永続化キューの送信側（インジェストが保持）
#[derive(Debug, Clone)]
pub struct PersistenceQueue {
    tx: mpsc::Sender<MessagePayload>,
}

impl PersistenceQueue {
    /// Waits for a free slot in the queue.
    ///
    /// Dropping the permit (or the pending future) releases the slot without queuing anything.
    pub async fn reserve(&self) -> Result<PersistencePermit<'_>, IngestError> {
        self.tx
            .reserve()
            .await
            .map(PersistencePermit)
            .map_err(|_| IngestError::QueueClosed("persistence"))
    }
}

/// 永続化キューの確保済みスロット
pub struct PersistencePermit<'a>(mpsc::Permit<'a, MessagePayload>);

impl PersistencePermit<'_> {
    /// Hands a payload off to the worker without waiting.
    pub fn send(self, payload: MessagePayload) {
        self.0.send(payload);
    }
}

/// 永続化キューを消費するワーカー
pub struct PersistenceWorker {
    store: Arc<dyn MessageStore>,
    rx: mpsc::Receiver<MessagePayload>,
}

/// Creates the bounded persistence queue and the worker draining it.
pub fn persistence_queue(
    store: Arc<dyn MessageStore>,
    capacity: usize,
) -> (PersistenceQueue, PersistenceWorker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PersistenceQueue { tx }, PersistenceWorker { store, rx })
}

impl PersistenceWorker {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drains the queue until every `PersistenceQueue` has been dropped.
    pub async fn run(mut self) {
        while let Some(payload) = self.rx.recv().await {
            self.persist(&payload).await;
        }
        tracing::info!("Persistence queue closed, worker stopped");
    }

    async fn persist(&self, payload: &MessagePayload) -> bool {
        match self.store.store(payload).await {
            Ok(true) => {
                tracing::debug!(
                    "Stored message from user {} in project {}",
                    payload.sender_id,
                    payload.project_id
                );
                true
            }
            Ok(false) => {
                tracing::warn!(
                    "Store did not acknowledge message from user {} in project {}",
                    payload.sender_id,
                    payload.project_id
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    "Failed to store message from user {} in project {}, dropping: {}",
                    payload.sender_id,
                    payload.project_id,
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MockMessageStore, ProjectId, StoreError, UserId},
        infrastructure::repository::InMemoryMessageStore,
    };
    use chrono::Utc;

    fn payload(content: &str) -> MessagePayload {
        MessagePayload {
            project_id: ProjectId::new(7),
            sender_id: UserId::new(1),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_worker_stores_queued_payloads_in_order() {
        // テスト項目: キューに入れた順にストアへ保存される
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::new());
        let (queue, worker) = persistence_queue(store.clone(), 4);
        let handle = worker.spawn();

        // when (操作):
        queue.reserve().await.unwrap().send(payload("one"));
        queue.reserve().await.unwrap().send(payload("two"));
        drop(queue);
        handle.await.unwrap();

        // then (期待する結果):
        let stored = store.all().await.unwrap();
        let contents: Vec<&str> = stored.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_store_failure_is_dropped_and_worker_continues() {
        // テスト項目: 保存に失敗しても再試行せず、次のメッセージの処理を続ける
        // given (前提条件):
        let mut store = MockMessageStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_store()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));
        store
            .expect_store()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        let (queue, worker) = persistence_queue(Arc::new(store), 4);
        let handle = worker.spawn();

        // when (操作):
        queue.reserve().await.unwrap().send(payload("lost"));
        queue.reserve().await.unwrap().send(payload("kept"));
        drop(queue);

        // then (期待する結果): ワーカーはパニックせず終了し、モックの期待回数が満たされる
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_reserve_after_worker_stopped_reports_closed_queue() {
        // テスト項目: ワーカーが停止した後の reserve は QueueClosed になる
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::new());
        let (queue, worker) = persistence_queue(store, 1);
        drop(worker);

        // when (操作):
        let result = queue.reserve().await;

        // then (期待する結果):
        assert!(matches!(result, Err(IngestError::QueueClosed("persistence"))));
    }
}
