//! Shared application state.

use std::{sync::Arc, time::Duration};

use crate::{
    domain::Authenticator,
    usecase::{ConnectUserUseCase, GetMessageHistoryUseCase, IngestEventUseCase},
};

/// Per-connection socket settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketSettings {
    /// Frames read off the socket ahead of ingestion
    pub inbound_buffer: usize,
    /// Ping interval; a failed ping closes the connection
    pub keepalive_interval: Duration,
}

/// Shared application state
pub struct AppState {
    /// ConnectUserUseCase（接続の登録・登録解除）
    pub connect_user_usecase: Arc<ConnectUserUseCase>,
    /// IngestEventUseCase（受信フレームの取り込み）
    pub ingest_event_usecase: Arc<IngestEventUseCase>,
    /// GetMessageHistoryUseCase（メッセージ履歴の取得）
    pub get_message_history_usecase: Arc<GetMessageHistoryUseCase>,
    /// Authenticator（認証ゲート）
    pub authenticator: Arc<dyn Authenticator>,
    /// ソケットごとの設定
    pub socket: SocketSettings,
}
