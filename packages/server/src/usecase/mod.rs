//! UseCase layer
//!
//! ファンアウトのパイプラインを構成するユースケースとバックグラウンドワーカー。
//!
//! ```text
//! read loop ─▶ IngestEventUseCase ─┬─▶ PersistenceQueue ─▶ PersistenceWorker ─▶ MessageStore
//!                                   └─▶ PublishQueue ─▶ RelayPublisher ─▶ Relay
//! Relay ─▶ RelaySubscriber ─▶ DispatchEventUseCase ─▶ ConnectionRegistry ─▶ writer task
//! ```

pub mod connect_user;
pub mod dispatch_event;
pub mod error;
pub mod get_message_history;
pub mod ingest_event;
pub mod persist_message;
pub mod publish_event;
pub mod subscribe_relay;

pub use connect_user::ConnectUserUseCase;
pub use dispatch_event::{DispatchEventUseCase, DispatchReport};
pub use error::{DispatchError, HistoryError, IngestError};
pub use get_message_history::GetMessageHistoryUseCase;
pub use ingest_event::IngestEventUseCase;
pub use persist_message::{
    PersistencePermit, PersistenceQueue, PersistenceWorker, persistence_queue,
};
pub use publish_event::{PublishPermit, PublishQueue, RelayPublisher, publish_queue};
pub use subscribe_relay::RelaySubscriber;
