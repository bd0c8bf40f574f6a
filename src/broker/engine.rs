//! Broker engine
//!
//! This module contains the in-memory registry behind the message broker:
//! - connected clients and, per client, its subscriptions and callbacks
//! - channels and their ordered membership
//! - precondition checks for connect/subscribe/unsubscribe/publish/disconnect
//!
//! Concurrency and usage notes:
//! - The engine is synchronous and owned by a single lock in
//!   [`MessageBroker`](crate::broker::MessageBroker). Every operation checks
//!   all of its preconditions before it mutates anything, so a rejected call
//!   leaves the registry exactly as it was.
//! - The engine never invokes subscriber callbacks itself. Operations return
//!   the invocations they imply ([`Notification`], [`PublishPlan`]) and the
//!   caller runs them after releasing the lock, so a callback may call back
//!   into the broker.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use crate::broker::callback::{ConnectionEvent, SharedConnectionCallback, SharedMessageCallback};
use crate::broker::channel::{Channel, Member};
use crate::broker::events::{BrokerEvent, EventBus};
use crate::broker::message::{
    ChannelSpec, ClientId, Delivery, MessageEnvelope, PublishOutcome, TargetClients,
};
use crate::utils::error::BrokerError;

/// Callbacks registered by one client for one channel.
#[derive(Clone)]
pub struct Subscription {
    pub version: String,
    message_callback: SharedMessageCallback,
    connection_callback: SharedConnectionCallback,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ClientRecord {
    // channel id -> subscription, ordered for deterministic notification lists
    subscriptions: BTreeMap<String, Subscription>,
}

impl ClientRecord {
    fn channel_specs(&self) -> Vec<ChannelSpec> {
        self.subscriptions
            .iter()
            .map(|(id, sub)| ChannelSpec::new(id.clone(), sub.version.clone()))
            .collect()
    }
}

/// A pending `clientConnectionCallback` invocation for one peer.
#[derive(Clone)]
pub struct Notification {
    pub target_client_id: ClientId,
    pub event: ConnectionEvent,
    pub client_id: ClientId,
    pub channels: Vec<ChannelSpec>,
    callback: SharedConnectionCallback,
}

impl Notification {
    pub fn deliver(&self) {
        self.callback
            .on_client_connection(self.event, &self.client_id, &self.channels);
    }

    /// Deliver a batch in order.
    pub fn deliver_all(notifications: &[Notification]) {
        for notification in notifications {
            notification.deliver();
        }
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("target_client_id", &self.target_client_id)
            .field("event", &self.event)
            .field("client_id", &self.client_id)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

struct PendingDelivery {
    target_client_id: ClientId,
    callback: SharedMessageCallback,
}

/// A validated publish: the envelope plus the resolved target callbacks.
pub struct PublishPlan {
    pub envelope: MessageEnvelope,
    deliveries: Vec<PendingDelivery>,
}

impl PublishPlan {
    /// Resolved targets in delivery order.
    pub fn target_ids(&self) -> Vec<&str> {
        self.deliveries
            .iter()
            .map(|d| d.target_client_id.as_str())
            .collect()
    }

    /// Invoke every target's message callback and collect the results.
    pub fn execute(self) -> PublishOutcome {
        let MessageEnvelope {
            channel_id,
            source_client_id,
            message_id,
            message_name,
            data,
            ..
        } = self.envelope;

        let deliveries = self
            .deliveries
            .into_iter()
            .map(|pending| Delivery {
                result: pending.callback.on_message(
                    &source_client_id,
                    &channel_id,
                    &message_name,
                    &data,
                ),
                target_client_id: pending.target_client_id,
            })
            .collect();

        PublishOutcome {
            message_id,
            deliveries,
        }
    }
}

impl fmt::Debug for PublishPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishPlan")
            .field("envelope", &self.envelope)
            .field("targets", &self.target_ids())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct MessageBrokerEngine {
    clients: HashMap<ClientId, ClientRecord>,
    channels: HashMap<String, Channel>,
    events: EventBus,
}

fn rejected(op: &str, client_id: &str, err: BrokerError) -> BrokerError {
    error!("{op} rejected for client '{client_id}': {err}");
    err
}

fn has_missing_channel(channels: &[ChannelSpec]) -> bool {
    channels.is_empty() || channels.iter().any(|c| c.channel_id.is_empty())
}

impl MessageBrokerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            events: EventBus::new(capacity),
            ..Self::default()
        }
    }

    /// Register a client with no subscriptions. Peers are not told.
    pub fn connect(&mut self, client_id: &str) -> Result<(), BrokerError> {
        if client_id.is_empty() {
            return Err(rejected("connect", client_id, BrokerError::MissingClientId));
        }
        if self.clients.contains_key(client_id) {
            return Err(rejected("connect", client_id, BrokerError::AlreadyConnected));
        }

        self.clients
            .insert(client_id.to_string(), ClientRecord::default());
        debug!("Client {client_id} connected");
        Ok(())
    }

    /// Subscribe a connected client to one or more channels.
    ///
    /// Returns one notification per peer already on any of the channels, in
    /// subscription order, each carrying the full requested channel list.
    pub fn subscribe(
        &mut self,
        client_id: &str,
        channels: &[ChannelSpec],
        message_callback: SharedMessageCallback,
        connection_callback: SharedConnectionCallback,
    ) -> Result<Vec<Notification>, BrokerError> {
        if client_id.is_empty() || has_missing_channel(channels) {
            return Err(rejected("subscribe", client_id, BrokerError::MissingParameters));
        }
        let Some(record) = self.clients.get_mut(client_id) else {
            return Err(rejected("subscribe", client_id, BrokerError::NotConnected));
        };

        for spec in channels {
            record.subscriptions.insert(
                spec.channel_id.clone(),
                Subscription {
                    version: spec.version.clone(),
                    message_callback: message_callback.clone(),
                    connection_callback: connection_callback.clone(),
                },
            );
            let channel = self
                .channels
                .entry(spec.channel_id.clone())
                .or_insert_with(|| Channel::new(&spec.channel_id));
            if channel.subscribe(client_id, &spec.version) {
                debug!("Client {client_id} subscribed to {}", spec.channel_id);
            }
        }

        self.events
            .emit(BrokerEvent::subscribed(client_id, channels.to_vec()));

        Ok(self.peer_notifications(
            client_id,
            channels.iter().map(|c| c.channel_id.as_str()),
            ConnectionEvent::ClientSubscribed,
            channels,
        ))
    }

    /// Remove a connected client from the named channels.
    ///
    /// Channels the client is not on are skipped. Remaining members of the
    /// channels it actually left are notified once each.
    pub fn unsubscribe(
        &mut self,
        client_id: &str,
        channels: &[ChannelSpec],
    ) -> Result<Vec<Notification>, BrokerError> {
        if client_id.is_empty() || has_missing_channel(channels) {
            return Err(rejected("unsubscribe", client_id, BrokerError::MissingParameters));
        }
        let Some(record) = self.clients.get_mut(client_id) else {
            return Err(rejected("unsubscribe", client_id, BrokerError::NotConnected));
        };

        let mut left = Vec::new();
        for spec in channels {
            if record.subscriptions.remove(&spec.channel_id).is_none() {
                debug!(
                    "Client {client_id} is not subscribed to {}; nothing to do",
                    spec.channel_id
                );
                continue;
            }
            if let Some(channel) = self.channels.get_mut(&spec.channel_id) {
                channel.unsubscribe(client_id);
            }
            left.push(spec.clone());
        }

        if left.is_empty() {
            return Ok(Vec::new());
        }

        self.events
            .emit(BrokerEvent::unsubscribed(client_id, left.clone()));
        let notifications = self.peer_notifications(
            client_id,
            left.iter().map(|c| c.channel_id.as_str()),
            ConnectionEvent::ClientUnsubscribed,
            &left,
        );
        self.drop_empty_channels(left.iter().map(|c| c.channel_id.as_str()));
        Ok(notifications)
    }

    /// Validate a publish and resolve its targets.
    ///
    /// Checks, first failure wins: source connected, channel known, source
    /// subscribed to the channel, every literal target subscribed to it.
    pub fn publish(&self, mut envelope: MessageEnvelope) -> Result<PublishPlan, BrokerError> {
        let source = envelope.source_client_id.as_str();
        if !self.clients.contains_key(source) {
            return Err(rejected("publish", source, BrokerError::NotConnected));
        }
        let Some(channel) = self.channels.get(&envelope.channel_id) else {
            return Err(rejected(
                "publish",
                source,
                BrokerError::UnknownChannel(envelope.channel_id.clone()),
            ));
        };
        if !channel.contains(source) {
            return Err(rejected("publish", source, BrokerError::NotSubscribed));
        }

        let target_ids: Vec<&str> = match &envelope.targets {
            TargetClients::Broadcast => channel.member_ids().filter(|id| *id != source).collect(),
            TargetClients::Literal(ids) => {
                if let Some(missing) = ids.iter().find(|id| !channel.contains(id)) {
                    debug!("Publish target {missing} is not on {}", envelope.channel_id);
                    return Err(rejected("publish", source, BrokerError::TargetNotFound));
                }
                let mut seen = HashSet::new();
                ids.iter()
                    .map(String::as_str)
                    .filter(|id| seen.insert(*id))
                    .collect()
            }
        };

        let deliveries = target_ids
            .into_iter()
            .filter_map(|target| {
                let subscription = self.subscription(target, &envelope.channel_id)?;
                Some(PendingDelivery {
                    target_client_id: target.to_string(),
                    callback: subscription.message_callback.clone(),
                })
            })
            .collect();

        if envelope.message_id.is_empty() {
            envelope.message_id = Uuid::new_v4().to_string();
        }
        debug!(
            "Client {} publishing '{}' ({}) on {}",
            envelope.source_client_id, envelope.message_name, envelope.message_id, envelope.channel_id
        );

        Ok(PublishPlan {
            envelope,
            deliveries,
        })
    }

    /// Remove a client and all of its subscriptions.
    ///
    /// Only the event bus hears about it; remaining subscribers' callbacks
    /// are not invoked. Disconnecting a client that is not connected is a
    /// no-op.
    pub fn disconnect(&mut self, client_id: &str) -> Result<(), BrokerError> {
        if client_id.is_empty() {
            return Err(rejected("disconnect", client_id, BrokerError::MissingClientId));
        }
        let Some(record) = self.clients.remove(client_id) else {
            debug!("Client {client_id} is not connected; nothing to disconnect");
            return Ok(());
        };

        let left = record.channel_specs();
        for spec in &left {
            if let Some(channel) = self.channels.get_mut(&spec.channel_id) {
                channel.unsubscribe(client_id);
            }
        }

        self.drop_empty_channels(left.iter().map(|c| c.channel_id.as_str()));
        self.events.emit(BrokerEvent::disconnected(client_id, left));
        debug!("Client {client_id} disconnected");
        Ok(())
    }

    /// Channel id -> members in subscription order.
    pub fn subscribed_clients(&self) -> BTreeMap<String, Vec<Member>> {
        self.channels
            .iter()
            .map(|(id, channel)| (id.clone(), channel.members.clone()))
            .collect()
    }

    /// Connected client ids, sorted.
    pub fn connected_clients(&self) -> Vec<ClientId> {
        let mut ids: Vec<_> = self.clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn is_subscribed(&self, client_id: &str, channel_id: &str) -> bool {
        self.subscription(client_id, channel_id).is_some()
    }

    /// Drop every client and channel. Event observers stay attached.
    pub fn reset(&mut self) {
        self.clients.clear();
        self.channels.clear();
        debug!("Broker registry reset");
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    fn subscription(&self, client_id: &str, channel_id: &str) -> Option<&Subscription> {
        self.clients.get(client_id)?.subscriptions.get(channel_id)
    }

    /// One notification per distinct peer on `channel_ids`, excluding
    /// `client_id`, in channel then subscription order.
    fn peer_notifications<'a>(
        &self,
        client_id: &str,
        channel_ids: impl Iterator<Item = &'a str>,
        event: ConnectionEvent,
        channels: &[ChannelSpec],
    ) -> Vec<Notification> {
        let mut seen = HashSet::new();
        let mut notifications = Vec::new();

        for channel_id in channel_ids {
            let Some(channel) = self.channels.get(channel_id) else {
                continue;
            };
            for peer in channel.member_ids() {
                if peer == client_id || !seen.insert(peer) {
                    continue;
                }
                if let Some(subscription) = self.subscription(peer, channel_id) {
                    notifications.push(Notification {
                        target_client_id: peer.to_string(),
                        event,
                        client_id: client_id.to_string(),
                        channels: channels.to_vec(),
                        callback: subscription.connection_callback.clone(),
                    });
                }
            }
        }

        notifications
    }

    fn drop_empty_channels<'a>(&mut self, channel_ids: impl Iterator<Item = &'a str>) {
        for channel_id in channel_ids {
            if self.channels.get(channel_id).is_some_and(Channel::is_empty) {
                self.channels.remove(channel_id);
                debug!("Channel {channel_id} has no subscribers left; removed");
            }
        }
    }
}

/// Build an envelope for [`MessageBrokerEngine::publish`].
pub fn envelope(
    channel_id: &str,
    source_client_id: &str,
    message_id: &str,
    message_name: &str,
    targets: TargetClients,
    data: Value,
) -> MessageEnvelope {
    MessageEnvelope {
        channel_id: channel_id.to_string(),
        source_client_id: source_client_id.to_string(),
        message_id: message_id.to_string(),
        message_name: message_name.to_string(),
        targets,
        data,
    }
}
