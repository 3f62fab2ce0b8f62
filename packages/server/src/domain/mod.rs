//! Domain layer
//!
//! イベント、接続ハンドル、値オブジェクト、および外部コラボレーター（ストア・リレー・
//! メンバーシップ・認証）の trait を定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

pub mod auth;
pub mod connection;
pub mod error;
pub mod event;
pub mod membership;
pub mod relay;
pub mod store;
pub mod value_object;

pub use auth::Authenticator;
pub use connection::{Connection, OutboundFrame, OutboundReceiver};
pub use error::{AuthError, RegistryError, RelayError, ResolveError, StoreError, WriteError};
pub use event::{
    Event, EventDraft, EventKind, MessageDraft, MessagePayload, NotificationDraft,
    NotificationPayload, RelayEnvelope,
};
pub use membership::RecipientResolver;
pub use relay::{Relay, RelayStream};
pub use store::MessageStore;
pub use value_object::{ConnectionId, InstanceId, ProjectId, UserId};

#[cfg(test)]
pub use membership::MockRecipientResolver;
#[cfg(test)]
pub use relay::MockRelay;
#[cfg(test)]
pub use store::MockMessageStore;
