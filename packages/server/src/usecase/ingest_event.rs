//! UseCase: インバウンドフレームの取り込みと分類
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - IngestEventUseCase::execute() メソッド
//! - デコード、サーバー側メタデータの付与、種別ごとのルーティング
//!
//! ### なぜこのテストが必要か
//! - message だけが永続化キューに入り、notification は決して入らないことを保証
//! - sender_id / created_at がクライアント値ではなくサーバー値になることを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：message / notification の取り込み
//! - 異常系：壊れたフレーム（接続は維持し、呼び出し側がログを出して読み続ける）
//! - エッジケース：永続化済みキュー投入後に接続が切れても永続化は完了する
//! - エッジケース：キュー待ちの途中で中断された取り込みはどちらのキューにも残らない

use std::sync::Arc;

use hibiki_shared::time::Clock;

use crate::domain::{Event, EventDraft, EventKind, InstanceId, RelayEnvelope, UserId};

use super::{error::IngestError, persist_message::PersistenceQueue, publish_event::PublishQueue};

/// フレーム取り込みのユースケース
///
/// 読み込みループから呼ばれます。宛先解決や他の接続への書き込みは行いません。
pub struct IngestEventUseCase {
    /// サーバーインスタンスの ID（エンベロープの送信元）
    origin: InstanceId,
    /// 永続化キュー
    persistence: PersistenceQueue,
    /// リレー publish キュー
    publisher: PublishQueue,
    /// CreatedAt を刻む時計
    clock: Arc<dyn Clock>,
}

impl IngestEventUseCase {
    pub fn new(
        origin: InstanceId,
        persistence: PersistenceQueue,
        publisher: PublishQueue,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            origin,
            persistence,
            publisher,
            clock,
        }
    }

    /// 1 フレームを取り込む
    ///
    /// # Arguments
    ///
    /// * `sender_id` - 接続を認証済みのユーザー ID
    /// * `text` - 受信したテキストフレーム
    ///
    /// # Returns
    ///
    /// * `Ok(EventKind)` - 分類された種別
    /// * `Err(IngestError::Decode)` - 壊れたフレーム（フレームは破棄）
    /// * `Err(IngestError::QueueClosed)` - バックグラウンドワーカーが停止済み
    pub async fn execute(&self, sender_id: UserId, text: &str) -> Result<EventKind, IngestError> {
        let draft = EventDraft::decode(text)?;
        let event = draft.into_event(sender_id, self.clock.now());
        let kind = event.kind();

        // 両方のスロットを確保してから投入する。待機中に中断されても何も投入されない
        let persistence = match &event {
            Event::Message(_) => Some(self.persistence.reserve().await?),
            Event::Notification(_) => None,
        };
        let publish = self.publisher.reserve().await?;

        // 投入済みのメッセージは接続が切れても保存される
        if let (Some(permit), Event::Message(payload)) = (persistence, &event) {
            permit.send(payload.clone());
        }
        publish.send(RelayEnvelope::new(self.origin, event));

        tracing::debug!("Ingested {:?} event from user {}", kind, sender_id);
        Ok(kind)
    }
}
