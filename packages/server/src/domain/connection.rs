//! Live connection handle
//!
//! `Connection` はソケットそのものではなく、接続ごとの書き込みタスクへ通じる
//! 有界チャンネルと、接続を閉じるためのシグナルを束ねたハンドルです。
//! レジストリが所有し、ディスパッチャーは `get` で得たクローン越しに書き込みます。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use super::{
    error::WriteError,
    value_object::{ConnectionId, UserId},
};

/// 書き込みタスクへ渡すシリアライズ済みフレーム
pub type OutboundFrame = Arc<str>;

/// 書き込みタスク側の受信口
pub type OutboundReceiver = mpsc::Receiver<OutboundFrame>;

/// ライブ接続へのハンドル
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<OutboundFrame>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Connection {
    /// Allocates a fresh connection and the receiving end its writer task drains.
    pub fn open(
        user_id: UserId,
        connected_at: DateTime<Utc>,
        outbound_buffer: usize,
    ) -> (Self, OutboundReceiver) {
        let (outbound, rx) = mpsc::channel(outbound_buffer.max(1));
        let connection = Self {
            id: ConnectionId::generate(),
            user_id,
            connected_at,
            outbound,
            shutdown: Arc::new(watch::Sender::new(false)),
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queues a frame for the writer task without waiting.
    ///
    /// A full buffer is reported as [`WriteError::Backpressure`] so a slow peer
    /// never stalls the caller.
    pub fn write(&self, frame: OutboundFrame) -> Result<(), WriteError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WriteError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => WriteError::Closed,
        })
    }

    /// Requests the `Open -> Closed` transition.
    ///
    /// Every current and future [`Connection::closed`] waiter observes it.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once [`Connection::close`] has been called.
    pub async fn closed(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives in `self`, so the wait only ends on close.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_write_delivers_frame_to_writer() {
        // テスト項目: write したフレームが書き込みタスク側で受信できる
        // given (前提条件):
        let (connection, mut rx) = Connection::open(UserId::new(1), Utc::now(), 4);

        // when (操作):
        let result = connection.write(Arc::from("hello"));

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_write_reports_backpressure_when_buffer_is_full() {
        // テスト項目: バッファが満杯の場合は待たずに Backpressure を返す
        // given (前提条件):
        let (connection, _rx) = Connection::open(UserId::new(1), Utc::now(), 1);
        connection.write(Arc::from("first")).unwrap();

        // when (操作):
        let result = connection.write(Arc::from("second"));

        // then (期待する結果):
        assert_eq!(result, Err(WriteError::Backpressure));
    }

    #[tokio::test]
    async fn test_write_reports_closed_after_writer_is_gone() {
        // テスト項目: 書き込みタスクが終了した接続への write は Closed を返す
        // given (前提条件):
        let (connection, rx) = Connection::open(UserId::new(1), Utc::now(), 4);
        drop(rx);

        // when (操作):
        let result = connection.write(Arc::from("late"));

        // then (期待する結果):
        assert_eq!(result, Err(WriteError::Closed));
    }

    #[tokio::test]
    async fn test_close_signal_is_observed_by_later_waiter() {
        // テスト項目: close 後に待ち始めたタスクも閉鎖シグナルを受け取れる
        // given (前提条件):
        let (connection, _rx) = Connection::open(UserId::new(1), Utc::now(), 4);
        let waiter = connection.clone();

        // when (操作):
        connection.close();
        let observed = tokio::time::timeout(Duration::from_secs(1), waiter.closed()).await;

        // then (期待する結果):
        assert!(observed.is_ok());
    }

    #[tokio::test]
    async fn test_close_wakes_every_waiter() {
        // テスト項目: 書き込みタスクと読み込みループの両方が閉鎖を観測できる
        // given (前提条件):
        let (connection, _rx) = Connection::open(UserId::new(1), Utc::now(), 4);
        let writer = tokio::spawn({
            let connection = connection.clone();
            async move { connection.closed().await }
        });
        let reader = tokio::spawn({
            let connection = connection.clone();
            async move { connection.closed().await }
        });
        tokio::task::yield_now().await;

        // when (操作):
        connection.close();

        // then (期待する結果):
        let both = tokio::time::timeout(Duration::from_secs(1), async {
            writer.await.unwrap();
            reader.await.unwrap();
        })
        .await;
        assert!(both.is_ok());
        assert!(connection.is_closed());
    }
}
