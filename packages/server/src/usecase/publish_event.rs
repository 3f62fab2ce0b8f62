//! UseCase: リレーへの publish（バックグラウンド）
//!
//! インジェストから有界キューで受け取ったエンベロープをエンコードし、共有チャンネルへ
//! publish します。publish の失敗はログに残して破棄します（そのイベントはどの
//! インスタンスにも配信されません）。

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::domain::{Relay, RelayEnvelope};

use super::error::IngestError;

/// Publish キューの送信側（インジェストが保持）
#[derive(Debug, Clone)]
pub struct PublishQueue {
    tx: mpsc::Sender<RelayEnvelope>,
}

impl PublishQueue {
    /// Waits for a free slot in the queue.
    pub async fn reserve(&self) -> Result<PublishPermit<'_>, IngestError> {
        self.tx
            .reserve()
            .await
            .map(PublishPermit)
            .map_err(|_| IngestError::QueueClosed("relay-publish"))
    }
}

/// Publish キューの確保済みスロット
pub struct PublishPermit<'a>(mpsc::Permit<'a, RelayEnvelope>);

impl PublishPermit<'_> {
    pub fn send(self, envelope: RelayEnvelope) {
        self.0.send(envelope);
    }
}

/// Publish キューを消費してリレーへ送るワーカー
pub struct RelayPublisher {
    relay: Arc<dyn Relay>,
    channel: String,
    rx: mpsc::Receiver<RelayEnvelope>,
}

/// Creates the bounded relay-publish queue and the publisher draining it.
pub fn publish_queue(
    relay: Arc<dyn Relay>,
    channel: impl Into<String>,
    capacity: usize,
) -> (PublishQueue, RelayPublisher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let publisher = RelayPublisher {
        relay,
        channel: channel.into(),
        rx,
    };
    (PublishQueue { tx }, publisher)
}

impl RelayPublisher {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        while let Some(envelope) = self.rx.recv().await {
            self.publish(&envelope).await;
        }
        tracing::info!("Relay-publish queue closed, publisher stopped");
    }

    async fn publish(&self, envelope: &RelayEnvelope) -> bool {
        let data = match envelope.encode() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Failed to encode relay envelope, dropping: {}", e);
                return false;
            }
        };

        match self.relay.publish(&self.channel, data).await {
            Ok(()) => {
                tracing::debug!(
                    "Published {:?} event from user {} to '{}'",
                    envelope.event.kind(),
                    envelope.event.sender_id(),
                    self.channel
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    "Failed to publish {:?} event from user {} to '{}', event lost: {}",
                    envelope.event.kind(),
                    envelope.event.sender_id(),
                    self.channel,
                    e
                );
                false
            }
        }
    }
}
