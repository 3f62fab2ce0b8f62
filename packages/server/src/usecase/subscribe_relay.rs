//! UseCase: リレー購読ループ
//!
//! 共有チャンネルを購読し、届いたエンベロープを 1 件ずつ `DispatchEventUseCase` に
//! 渡します。購読の失敗・切断時はバックオフしながら再購読し、タスク自体は終了しません。
//! デコードできない要素や取りこぼし通知はスキップします。

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::{
    config::BackoffPolicy,
    domain::{Relay, RelayEnvelope, RelayError},
};

use super::dispatch_event::DispatchEventUseCase;

/// リレー購読ループ
pub struct RelaySubscriber {
    relay: Arc<dyn Relay>,
    channel: String,
    dispatcher: Arc<DispatchEventUseCase>,
    backoff: BackoffPolicy,
}

impl RelaySubscriber {
    pub fn new(
        relay: Arc<dyn Relay>,
        channel: impl Into<String>,
        dispatcher: Arc<DispatchEventUseCase>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            relay,
            channel: channel.into(),
            dispatcher,
            backoff,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Subscribes and dispatches forever.
    pub async fn run(self) {
        let mut failures: u32 = 0;
        loop {
            match self.relay.subscribe(&self.channel).await {
                Ok(mut stream) => {
                    tracing::info!("Subscribed to relay channel '{}'", self.channel);
                    failures = 0;
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(data) => self.handle(&data).await,
                            Err(RelayError::Lagged(skipped)) => {
                                tracing::warn!(
                                    "Relay subscriber lagged on '{}', {} envelopes skipped",
                                    self.channel,
                                    skipped
                                );
                            }
                            Err(RelayError::Closed) => break,
                            Err(e) => {
                                tracing::warn!("Relay receive error on '{}': {}", self.channel, e);
                            }
                        }
                    }
                    tracing::warn!("Relay subscription to '{}' ended", self.channel);
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to subscribe to relay channel '{}': {}",
                        self.channel,
                        e
                    );
                }
            }

            let delay = self.backoff.delay(failures);
            failures = failures.saturating_add(1);
            tracing::info!("Resubscribing to '{}' in {:?}", self.channel, delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn handle(&self, data: &[u8]) {
        let envelope = match RelayEnvelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Skipping undecodable relay envelope: {}", e);
                return;
            }
        };

        match self.dispatcher.execute(&envelope).await {
            Ok(_) => {}
            Err(e) if e.is_resolution_failure() => {
                tracing::warn!(
                    "Skipping {:?} event from user {} (origin {}): {}",
                    envelope.event.kind(),
                    envelope.event.sender_id(),
                    envelope.origin,
                    e
                );
            }
            Err(e) => {
                tracing::error!(
                    "Dropping {:?} event from user {} (origin {}): {}",
                    envelope.event.kind(),
                    envelope.event.sender_id(),
                    envelope.origin,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            Connection, EventDraft, InstanceId, MessageDraft, OutboundReceiver, ProjectId,
            RelayStream, UserId,
        },
        infrastructure::{
            ConnectionRegistry, relay::InMemoryRelay, repository::InMemoryMembershipStore,
        },
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(20),
        }
    }

    fn envelope(content: &str) -> RelayEnvelope {
        let event = EventDraft::Message(MessageDraft {
            project_id: ProjectId::new(7),
            content: content.to_string(),
        })
        .into_event(UserId::new(1), Utc::now());
        RelayEnvelope::new(InstanceId::generate(), event)
    }

    /// 1 インスタンス分（レジストリ＋ディスパッチャー）を組み立てる
    fn instance(
        membership: &InMemoryMembershipStore,
    ) -> (Arc<ConnectionRegistry>, Arc<DispatchEventUseCase>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(DispatchEventUseCase::new(
            registry.clone(),
            Arc::new(membership.clone()),
        ));
        (registry, dispatcher)
    }

    fn connect(registry: &ConnectionRegistry, user: u64) -> OutboundReceiver {
        let (connection, rx) = Connection::open(UserId::new(user), Utc::now(), 8);
        registry.add(connection);
        rx
    }

    async fn recv_content(rx: &mut OutboundReceiver) -> String {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        value["payload"]["content"].as_str().unwrap().to_string()
    }

    /// 最初の subscribe を失敗させ、以降は内側の relay に委譲する
    struct FlakyRelay {
        inner: InMemoryRelay,
        failures_left: AtomicUsize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Relay for FlakyRelay {
        async fn publish(&self, channel: &str, data: Vec<u8>) -> Result<(), RelayError> {
            self.inner.publish(channel, data).await
        }

        async fn subscribe(&self, channel: &str) -> Result<RelayStream, RelayError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(RelayError::Unavailable("connection refused".to_string()));
            }
            self.inner.subscribe(channel).await
        }
    }

    /// 購読タスクが subscribe を終えるまで待つ
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    fn subscriber(relay: Arc<dyn Relay>, dispatcher: Arc<DispatchEventUseCase>) -> JoinHandle<()> {
        RelaySubscriber::new(relay, "messages", dispatcher, fast_backoff()).spawn()
    }

    #[tokio::test]
    async fn test_event_published_on_one_instance_is_dispatched_by_every_instance() {
        // テスト項目: インスタンス A で publish したイベントを A・B 両方のディスパッチャーが配信する
        // given (前提条件):
        let relay = Arc::new(InMemoryRelay::new(16));
        let members = vec![UserId::new(1), UserId::new(2)];
        let membership = InMemoryMembershipStore::with_projects([(ProjectId::new(7), members)]);
        let (registry_a, dispatcher_a) = instance(&membership);
        let (registry_b, dispatcher_b) = instance(&membership);
        let mut alice_on_a = connect(&registry_a, 1);
        let mut bob_on_b = connect(&registry_b, 2);
        let sub_a = subscriber(relay.clone(), dispatcher_a);
        let sub_b = subscriber(relay.clone(), dispatcher_b);
        settle().await;

        // when (操作):
        relay
            .publish("messages", envelope("hi").encode().unwrap())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(recv_content(&mut alice_on_a).await, "hi");
        assert_eq!(recv_content(&mut bob_on_b).await, "hi");
        sub_a.abort();
        sub_b.abort();
    }

    #[tokio::test]
    async fn test_undecodable_envelope_is_skipped() {
        // テスト項目: デコードできない要素はスキップされ、後続のエンベロープは配信される
        // given (前提条件):
        let relay = Arc::new(InMemoryRelay::new(16));
        let membership =
            InMemoryMembershipStore::with_projects([(ProjectId::new(7), vec![UserId::new(1)])]);
        let (registry, dispatcher) = instance(&membership);
        let mut alice = connect(&registry, 1);
        let handle = subscriber(relay.clone(), dispatcher);
        settle().await;

        // when (操作):
        relay
            .publish("messages", b"not an envelope".to_vec())
            .await
            .unwrap();
        relay
            .publish("messages", envelope("still alive").encode().unwrap())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(recv_content(&mut alice).await, "still alive");
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn test_subscriber_retries_after_subscribe_failure() {
        // テスト項目: subscribe が一時的に失敗しても、タスクは落ちずに再購読する
        // given (前提条件):
        let relay = Arc::new(FlakyRelay {
            inner: InMemoryRelay::new(16),
            failures_left: AtomicUsize::new(2),
            attempts: AtomicUsize::new(0),
        });
        let membership =
            InMemoryMembershipStore::with_projects([(ProjectId::new(7), vec![UserId::new(1)])]);
        let (registry, dispatcher) = instance(&membership);
        let mut alice = connect(&registry, 1);

        // when (操作):
        let handle = subscriber(relay.clone(), dispatcher);
        settle().await;
        relay
            .publish("messages", envelope("recovered").encode().unwrap())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(recv_content(&mut alice).await, "recovered");
        assert_eq!(relay.attempts.load(Ordering::SeqCst), 3);
        handle.abort();
    }

    #[tokio::test]
    async fn test_subscriber_resubscribes_after_stream_ends() {
        // テスト項目: 購読ストリームが切れた後も再購読して配信を続ける
        // given (前提条件):
        let relay = Arc::new(InMemoryRelay::new(16));
        let membership =
            InMemoryMembershipStore::with_projects([(ProjectId::new(7), vec![UserId::new(1)])]);
        let (registry, dispatcher) = instance(&membership);
        let mut alice = connect(&registry, 1);
        let handle = subscriber(relay.clone(), dispatcher);
        settle().await;

        // when (操作):
        relay.disconnect_all().await;
        settle().await;
        relay
            .publish("messages", envelope("after reconnect").encode().unwrap())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(recv_content(&mut alice).await, "after reconnect");
        handle.abort();
    }
}
