//! Events
//!
//! クライアントから届くフレーム（`EventDraft`）、サーバー側でメタデータを付与した
//! イベント（`Event`）、インスタンス間で運ばれる `RelayEnvelope` を定義します。
//!
//! ワイヤ形式はどれも `{"event_type": "...", "payload": {...}}` です。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_object::{InstanceId, ProjectId, UserId};

/// イベントの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// 永続化され、プロジェクトのメンバーに配信される
    Message,
    /// 永続化されず、イベント自身が指定する宛先に配信される
    Notification,
}

/// プロジェクトに属するメッセージ
///
/// 作成後は変更されません。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub project_id: ProjectId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 宛先を自身で持つ通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub recipients: Vec<UserId>,
    pub sender_id: UserId,
    #[serde(default)]
    pub body: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// 分類済みのイベント（アウトバウンドフレームと同じ形）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload", rename_all = "lowercase")]
pub enum Event {
    Message(MessagePayload),
    Notification(NotificationPayload),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Message(_) => EventKind::Message,
            Event::Notification(_) => EventKind::Notification,
        }
    }

    pub fn sender_id(&self) -> UserId {
        match self {
            Event::Message(payload) => payload.sender_id,
            Event::Notification(payload) => payload.sender_id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Event::Message(payload) => payload.created_at,
            Event::Notification(payload) => payload.created_at,
        }
    }

    /// Project scope of a message; notifications carry none.
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            Event::Message(payload) => Some(payload.project_id),
            Event::Notification(_) => None,
        }
    }
}

/// クライアントから届いたメッセージ本文
///
/// `sender_id` と `created_at` はサーバーが付与するため、ここには含めません
/// （クライアントが送ってきても無視されます）。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageDraft {
    pub project_id: ProjectId,
    pub content: String,
}

/// クライアントから届いた通知本文
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationDraft {
    pub recipients: Vec<UserId>,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// デコード済みのインバウンドフレーム
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event_type", content = "payload", rename_all = "lowercase")]
pub enum EventDraft {
    Message(MessageDraft),
    Notification(NotificationDraft),
}

impl EventDraft {
    /// Decodes one inbound text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Stamps the server-side metadata and produces the immutable event.
    pub fn into_event(self, sender_id: UserId, created_at: DateTime<Utc>) -> Event {
        match self {
            EventDraft::Message(draft) => Event::Message(MessagePayload {
                project_id: draft.project_id,
                sender_id,
                content: draft.content,
                created_at,
            }),
            EventDraft::Notification(draft) => Event::Notification(NotificationPayload {
                recipients: draft.recipients,
                sender_id,
                body: draft.body,
                created_at,
            }),
        }
    }
}

/// リレー上を運ばれる単位
///
/// 受信側インスタンスが自分で宛先解決できるよう、プロジェクト ID を併せて運びます。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub origin: InstanceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub event: Event,
}

impl RelayEnvelope {
    pub fn new(origin: InstanceId, event: Event) -> Self {
        Self {
            origin,
            project_id: event.project_id(),
            event,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
