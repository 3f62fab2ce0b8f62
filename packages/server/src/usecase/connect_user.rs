//! UseCase: 接続の登録と登録解除
//!
//! アップグレード成功時に新しい `Connection` を割り当ててレジストリへ登録し、
//! 読み込みループ終了時に登録を解除します。

use std::sync::Arc;

use hibiki_shared::time::Clock;

use crate::{
    domain::{Connection, OutboundReceiver, UserId},
    infrastructure::ConnectionRegistry,
};

/// 接続管理のユースケース
pub struct ConnectUserUseCase {
    registry: Arc<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    outbound_buffer: usize,
}

impl ConnectUserUseCase {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        clock: Arc<dyn Clock>,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            registry,
            clock,
            outbound_buffer,
        }
    }

    /// 新しい接続を割り当てて登録する
    ///
    /// 同じユーザーの既存の接続は置き換えられ、閉じられます。
    pub fn connect(&self, user_id: UserId) -> (Connection, OutboundReceiver) {
        let (connection, rx) = Connection::open(user_id, self.clock.now(), self.outbound_buffer);
        if self.registry.add(connection.clone()).is_some() {
            tracing::info!("User {} reconnected, previous connection closed", user_id);
        }
        (connection, rx)
    }

    /// 接続の登録を解除する
    ///
    /// 既に後続の接続に置き換えられている場合は何もしません（NotFound は無視）。
    ///
    /// # Returns
    ///
    /// 登録を解除した場合は `true`
    pub fn disconnect(&self, connection: &Connection) -> bool {
        match self
            .registry
            .remove_connection(connection.user_id(), connection.id())
        {
            Ok(_) => {
                tracing::info!(
                    "Connection {} of user {} removed from registry",
                    connection.id(),
                    connection.user_id()
                );
                true
            }
            Err(e) => {
                tracing::debug!("Connection {} already deregistered: {}", connection.id(), e);
                false
            }
        }
    }
}
