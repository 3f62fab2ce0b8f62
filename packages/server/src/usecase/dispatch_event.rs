//! UseCase: リレーで届いたイベントのファンアウト
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DispatchEventUseCase::execute() メソッド
//! - message の宛先解決（配信時点のメンバーシップ）と、notification の宛先指定配信
//!
//! ### なぜこのテストが必要か
//! - メンバー以外の接続に message が書き込まれないことを保証
//! - 解決エラー・未接続・書き込みエラーがいずれも致命的でないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：接続中の全メンバーに配信（送信者自身を含む）
//! - 異常系：宛先解決の失敗（このイベントの配信はスキップ）
//! - エッジケース：メンバーが未接続／接続が壊れている

use std::{sync::Arc, time::Duration};

use crate::{
    config::DEFAULT_RESOLVE_TIMEOUT,
    domain::{Event, OutboundFrame, RecipientResolver, RelayEnvelope, ResolveError, UserId},
    infrastructure::ConnectionRegistry,
};

use super::error::DispatchError;

/// 1 イベント分の配信結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Frames queued on a live connection
    pub delivered: Vec<UserId>,
    /// Recipients without a connection on this instance
    pub offline: Vec<UserId>,
    /// Recipients whose connection rejected the write
    pub failed: Vec<UserId>,
}

/// ファンアウト配信のユースケース
pub struct DispatchEventUseCase {
    /// インスタンスローカルな接続レジストリ（参照のみ）
    registry: Arc<ConnectionRegistry>,
    /// プロジェクトメンバーの解決
    resolver: Arc<dyn RecipientResolver>,
    /// 1 回のメンバー解決の上限時間（応答しないストアで後続の配信を止めない）
    resolve_timeout: Duration,
}

impl DispatchEventUseCase {
    pub fn new(registry: Arc<ConnectionRegistry>, resolver: Arc<dyn RecipientResolver>) -> Self {
        Self {
            registry,
            resolver,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    /// 1 エンベロープを配信する
    ///
    /// # Returns
    ///
    /// * `Ok(DispatchReport)` - 配信結果（未接続・書き込み失敗も含む）
    /// * `Err(DispatchError)` - 宛先解決に失敗し、何も配信しなかった
    pub async fn execute(&self, envelope: &RelayEnvelope) -> Result<DispatchReport, DispatchError> {
        let recipients = self.recipients(envelope).await?;
        let frame: OutboundFrame = serde_json::to_string(&envelope.event)?.into();

        let mut report = DispatchReport::default();
        for user_id in recipients {
            let connection = match self.registry.get(user_id) {
                Ok(connection) => connection,
                Err(_) => {
                    report.offline.push(user_id);
                    continue;
                }
            };

            // 壊れた接続は読み込みループ側が検知して登録解除する
            match connection.write(frame.clone()) {
                Ok(()) => report.delivered.push(user_id),
                Err(e) => {
                    tracing::warn!(
                        "Failed to write {:?} event to user {} (connection {}): {}",
                        envelope.event.kind(),
                        user_id,
                        connection.id(),
                        e
                    );
                    report.failed.push(user_id);
                }
            }
        }

        tracing::debug!(
            "Dispatched {:?} event from user {}: {} delivered, {} offline, {} failed",
            envelope.event.kind(),
            envelope.event.sender_id(),
            report.delivered.len(),
            report.offline.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Delivery targets, evaluated now rather than at publish time.
    async fn recipients(&self, envelope: &RelayEnvelope) -> Result<Vec<UserId>, DispatchError> {
        let mut recipients = match &envelope.event {
            Event::Message(payload) => {
                let project_id = envelope.project_id.unwrap_or(payload.project_id);
                tokio::time::timeout(self.resolve_timeout, self.resolver.members_of(project_id))
                    .await
                    .map_err(|_| ResolveError::Timeout(self.resolve_timeout))??
            }
            Event::Notification(payload) => payload.recipients.clone(),
        };
        recipients.sort_unstable();
        recipients.dedup();
        Ok(recipients)
    }
}
