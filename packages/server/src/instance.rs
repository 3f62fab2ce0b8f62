//! Wiring of one server instance.
//!
//! 依存関係の初期化順序:
//! 1. Registry
//! 2. Persistence queue / Relay publish queue とそのワーカー
//! 3. Dispatcher と Relay subscriber
//! 4. UseCases
//! 5. AppState

use std::sync::Arc;

use hibiki_shared::time::Clock;
use tokio::task::JoinHandle;

use crate::{
    config::ServerConfig,
    domain::{Authenticator, InstanceId, MessageStore, RecipientResolver, Relay},
    infrastructure::ConnectionRegistry,
    ui::{AppState, state::SocketSettings},
    usecase::{
        ConnectUserUseCase, DispatchEventUseCase, GetMessageHistoryUseCase, IngestEventUseCase,
        RelaySubscriber, persistence_queue, publish_queue,
    },
};

/// External collaborators an instance is built on
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn MessageStore>,
    pub relay: Arc<dyn Relay>,
    pub resolver: Arc<dyn RecipientResolver>,
    pub authenticator: Arc<dyn Authenticator>,
    pub clock: Arc<dyn Clock>,
}

/// A running instance: shared state plus its background consumers.
pub struct Instance {
    id: InstanceId,
    state: Arc<AppState>,
    registry: Arc<ConnectionRegistry>,
    workers: Vec<JoinHandle<()>>,
}

impl Instance {
    /// Builds the pipeline and spawns the persistence worker, the relay publisher
    /// and the relay subscriber. Must be called inside a tokio runtime.
    pub fn start(config: &ServerConfig, collaborators: Collaborators) -> Self {
        let id = InstanceId::generate();
        let Collaborators {
            store,
            relay,
            resolver,
            authenticator,
            clock,
        } = collaborators;

        // 1. Registry
        let registry = Arc::new(ConnectionRegistry::new());

        // 2. Queues and their consumers
        let (persistence, persistence_worker) =
            persistence_queue(store.clone(), config.persistence_queue_capacity);
        let (publisher, relay_publisher) = publish_queue(
            relay.clone(),
            config.relay_channel.clone(),
            config.publish_queue_capacity,
        );

        // 3. Dispatch path
        let dispatcher = Arc::new(
            DispatchEventUseCase::new(registry.clone(), resolver.clone())
                .with_resolve_timeout(config.resolve_timeout),
        );
        let subscriber = RelaySubscriber::new(
            relay,
            config.relay_channel.clone(),
            dispatcher,
            config.resubscribe,
        );

        let workers = vec![
            persistence_worker.spawn(),
            relay_publisher.spawn(),
            subscriber.spawn(),
        ];

        // 4. UseCases
        let connect_user_usecase = Arc::new(ConnectUserUseCase::new(
            registry.clone(),
            clock.clone(),
            config.outbound_buffer,
        ));
        let ingest_event_usecase = Arc::new(IngestEventUseCase::new(
            id,
            persistence,
            publisher,
            clock.clone(),
        ));
        let get_message_history_usecase =
            Arc::new(GetMessageHistoryUseCase::new(store, resolver, clock));

        // 5. AppState
        let state = Arc::new(AppState {
            connect_user_usecase,
            ingest_event_usecase,
            get_message_history_usecase,
            authenticator,
            socket: SocketSettings {
                inbound_buffer: config.inbound_buffer,
                keepalive_interval: config.keepalive_interval,
            },
        });

        tracing::info!(
            "Instance {} started on relay channel '{}'",
            id,
            config.relay_channel
        );

        Self {
            id,
            state,
            registry,
            workers,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Stops the background consumers abruptly; queued items are lost.
    pub fn shutdown(self) {
        for worker in &self.workers {
            worker.abort();
        }
        tracing::info!("Instance {} stopped", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::UserId,
        infrastructure::{
            auth::AllowAllAuthenticator,
            relay::InMemoryRelay,
            repository::{InMemoryMembershipStore, InMemoryMessageStore},
        },
    };
    use hibiki_shared::time::SystemClock;

    fn collaborators() -> Collaborators {
        Collaborators {
            store: Arc::new(InMemoryMessageStore::new()),
            relay: Arc::new(InMemoryRelay::default()),
            resolver: Arc::new(InMemoryMembershipStore::new()),
            authenticator: Arc::new(AllowAllAuthenticator),
            clock: Arc::new(SystemClock),
        }
    }

    #[tokio::test]
    async fn test_instances_get_distinct_ids() {
        // テスト項目: インスタンスごとに異なる ID が割り当てられる
        // given (前提条件):
        let config = ServerConfig::default();

        // when (操作):
        let a = Instance::start(&config, collaborators());
        let b = Instance::start(&config, collaborators());

        // then (期待する結果):
        assert_ne!(a.id(), b.id());
        a.shutdown();
        b.shutdown();
    }

    #[tokio::test]
    async fn test_connect_use_case_shares_instance_registry() {
        // テスト項目: AppState の接続ユースケースがインスタンスのレジストリに登録する
        // given (前提条件):
        let instance = Instance::start(&ServerConfig::default(), collaborators());

        // when (操作):
        let (_connection, _rx) = instance.state().connect_user_usecase.connect(UserId::new(1));

        // then (期待する結果):
        assert_eq!(instance.registry().len(), 1);
        instance.shutdown();
    }
}
