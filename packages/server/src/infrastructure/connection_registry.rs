//! Connection registry
//!
//! ## 責務
//!
//! - ユーザー ID → ライブ接続ハンドルの対応をインスタンスローカルに保持
//! - `add` / `remove` / `get` の 3 操作のみを公開（全件の走査は外部に公開しない）
//!
//! ## 設計ノート
//!
//! `DashMap` はキーをシャードに分けてロックするため、異なるユーザーへの操作は
//! 互いをブロックしません。エントリは 1 ユーザーにつき 1 接続で、後から `add` された
//! 接続が勝ちます（置き換えられた接続は閉じられます）。

use dashmap::DashMap;

use crate::domain::{Connection, ConnectionId, RegistryError, UserId};

/// インスタンスローカルな接続レジストリ
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<UserId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `connection` for its user, replacing any earlier entry.
    ///
    /// The replaced connection is closed and returned.
    pub fn add(&self, connection: Connection) -> Option<Connection> {
        let user_id = connection.user_id();
        let connection_id = connection.id();
        let replaced = self.connections.insert(user_id, connection);

        match &replaced {
            Some(previous) => {
                previous.close();
                tracing::info!(
                    "Connection {} of user {} replaced by {}",
                    previous.id(),
                    user_id,
                    connection_id
                );
            }
            None => {
                tracing::debug!("Connection {} registered for user {}", connection_id, user_id);
            }
        }

        replaced
    }

    /// Removes the entry for `user_id` whatever connection it holds.
    pub fn remove(&self, user_id: UserId) -> Result<Connection, RegistryError> {
        self.connections
            .remove(&user_id)
            .map(|(_, connection)| connection)
            .ok_or(RegistryError::NotFound(user_id))
    }

    /// Removes the entry for `user_id` only while it still holds `connection_id`.
    ///
    /// A read loop whose connection was already replaced gets `NotFound` and leaves
    /// the successor registered.
    pub fn remove_connection(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<Connection, RegistryError> {
        self.connections
            .remove_if(&user_id, |_, connection| connection.id() == connection_id)
            .map(|(_, connection)| connection)
            .ok_or(RegistryError::NotFound(user_id))
    }

    pub fn get(&self, user_id: UserId) -> Result<Connection, RegistryError> {
        self.connections
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NotFound(user_id))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
