//! The `broker` module: channel registry, dispatch, and the shared
//! [`MessageBroker`] handle used by transports and embedders.

pub mod callback;
pub mod channel;
pub mod engine;
pub mod events;
pub mod message;
pub mod origins;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

pub use callback::{ConnectionCallback, ConnectionEvent, MessageCallback};
pub use channel::Member;
pub use engine::{MessageBrokerEngine, Notification, PublishPlan};
pub use events::BrokerEvent;
pub use message::{ChannelSpec, ClientId, MessageEnvelope, PublishOutcome, TargetClients};
pub use origins::AcceptedOrigins;

use crate::config::BrokerSettings;
use crate::utils::error::BrokerError;

#[derive(Debug)]
struct Shared {
    engine: Mutex<MessageBrokerEngine>,
    enabled: AtomicBool,
    origins: RwLock<AcceptedOrigins>,
}

/// Cloneable handle to one broker instance.
///
/// Registry operations run under a single lock and are strictly
/// check-then-act. Subscriber callbacks run after the lock is released, on
/// the caller's thread, before the operation returns.
#[derive(Debug, Clone)]
pub struct MessageBroker {
    inner: Arc<Shared>,
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::from_settings(&BrokerSettings::default())
    }
}

impl MessageBroker {
    /// Create an enabled broker that accepts `host_origin`.
    pub fn new(host_origin: &str) -> Self {
        Self::build(
            MessageBrokerEngine::new(),
            true,
            AcceptedOrigins::new(host_origin),
        )
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        let mut origins = AcceptedOrigins::new(&settings.host_origin);
        for origin in &settings.accepted_origins {
            origins.add(origin);
        }
        Self::build(
            MessageBrokerEngine::with_event_capacity(settings.event_capacity),
            settings.enabled,
            origins,
        )
    }

    fn build(engine: MessageBrokerEngine, enabled: bool, origins: AcceptedOrigins) -> Self {
        Self {
            inner: Arc::new(Shared {
                engine: Mutex::new(engine),
                enabled: AtomicBool::new(enabled),
                origins: RwLock::new(origins),
            }),
        }
    }

    fn engine(&self) -> MutexGuard<'_, MessageBrokerEngine> {
        self.inner
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_enabled(&self, op: &str, client_id: &str) -> Result<(), BrokerError> {
        if self.is_enabled() {
            Ok(())
        } else {
            let err = BrokerError::Disabled;
            error!("{op} rejected for client '{client_id}': {err}");
            Err(err)
        }
    }

    pub fn connect(&self, client_id: &str) -> Result<(), BrokerError> {
        self.ensure_enabled("connect", client_id)?;
        self.engine().connect(client_id)
    }

    pub fn subscribe<M, C>(
        &self,
        client_id: &str,
        channels: &[ChannelSpec],
        message_callback: M,
        connection_callback: C,
    ) -> Result<(), BrokerError>
    where
        M: MessageCallback + 'static,
        C: ConnectionCallback + 'static,
    {
        self.ensure_enabled("subscribe", client_id)?;
        let notifications = self.engine().subscribe(
            client_id,
            channels,
            Arc::new(message_callback),
            Arc::new(connection_callback),
        )?;
        Notification::deliver_all(&notifications);
        Ok(())
    }

    pub fn unsubscribe(&self, client_id: &str, channels: &[ChannelSpec]) -> Result<(), BrokerError> {
        self.ensure_enabled("unsubscribe", client_id)?;
        let notifications = self.engine().unsubscribe(client_id, channels)?;
        Notification::deliver_all(&notifications);
        Ok(())
    }

    /// Deliver a message to `targets` on `channel_id` and collect each
    /// target's callback result. Nothing is delivered if any check fails.
    pub fn publish(
        &self,
        channel_id: &str,
        source_client_id: &str,
        message_id: &str,
        message_name: &str,
        targets: TargetClients,
        data: Value,
    ) -> Result<PublishOutcome, BrokerError> {
        self.ensure_enabled("publish", source_client_id)?;
        let plan = self.engine().publish(engine::envelope(
            channel_id,
            source_client_id,
            message_id,
            message_name,
            targets,
            data,
        ))?;
        Ok(plan.execute())
    }

    pub fn disconnect(&self, client_id: &str) -> Result<(), BrokerError> {
        self.ensure_enabled("disconnect", client_id)?;
        self.engine().disconnect(client_id)
    }

    /// Drop a client whose transport has gone away.
    ///
    /// Same cleanup as [`disconnect`](Self::disconnect), but it also runs
    /// while the broker is disabled. A dead peer must never hold on to its
    /// id or its callbacks.
    pub fn evict(&self, client_id: &str) -> Result<(), BrokerError> {
        self.engine().disconnect(client_id)
    }

    pub fn add_accepted_origin(&self, origin: &str) {
        self.inner
            .origins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(origin);
    }

    pub fn remove_accepted_origin(&self, origin: &str) {
        self.inner
            .origins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(origin);
    }

    pub fn get_accepted_origins(&self) -> Vec<String> {
        self.inner
            .origins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list()
    }

    pub fn is_origin_accepted(&self, origin: &str) -> bool {
        self.inner
            .origins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(origin)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.inner.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(
                "Message broker {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Channel id -> subscribed clients in subscription order.
    pub fn get_subscribed_clients(&self) -> BTreeMap<String, Vec<Member>> {
        self.engine().subscribed_clients()
    }

    pub fn get_connected_clients(&self) -> Vec<ClientId> {
        self.engine().connected_clients()
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.engine().is_connected(client_id)
    }

    /// Observe membership events (subscribe, unsubscribe, disconnect).
    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.engine().subscribe_events()
    }

    /// Clear all clients and channels. Origins and the enabled flag are kept.
    pub fn reset(&self) {
        self.engine().reset();
        debug!("Message broker reset");
    }
}
