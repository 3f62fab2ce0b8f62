//! In-memory pub/sub relay
//!
//! チャンネル名ごとに `tokio::sync::broadcast` を持ちます。同じ `InMemoryRelay` を
//! 複数のディスパッチャーで共有すると、複数インスタンス構成を 1 プロセス内で再現できます。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{Mutex, broadcast};

use crate::domain::{Relay, RelayError, RelayStream};

/// プロセス内 Relay 実装
#[derive(Debug, Clone)]
pub struct InMemoryRelay {
    /// Channel → broadcast sender
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
    /// Buffer size of each broadcast channel
    buffer_size: usize,
}

impl InMemoryRelay {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Drops every channel, ending all open subscription streams.
    pub async fn disconnect_all(&self) {
        self.channels.lock().await.clear();
    }
}

impl Default for InMemoryRelay {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Relay for InMemoryRelay {
    async fn publish(&self, channel: &str, data: Vec<u8>) -> Result<(), RelayError> {
        let channels = self.channels.lock().await;
        match channels.get(channel) {
            Some(tx) => {
                // 購読者がいない場合の送信失敗は pub/sub としては正常
                let receivers = tx.send(data).unwrap_or(0);
                tracing::debug!("Published to '{}' ({} subscribers)", channel, receivers);
            }
            None => {
                tracing::debug!("Published to '{}' with no subscribers", channel);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<RelayStream, RelayError> {
        let rx = {
            let mut channels = self.channels.lock().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.buffer_size).0)
                .subscribe()
        };

        // A closed channel yields one `Closed` item, then the stream ends
        let stream = stream::unfold(Some(rx), |state| async move {
            let mut rx = state?;
            match rx.recv().await {
                Ok(data) => Some((Ok(data), Some(rx))),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    Some((Err(RelayError::Lagged(skipped)), Some(rx)))
                }
                Err(broadcast::error::RecvError::Closed) => Some((Err(RelayError::Closed), None)),
            }
        });

        Ok(Box::pin(stream))
    }
}
