//! Connection worker and publish path for the broker link.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command;
use crate::bus::ChangeBus;
use crate::config::BrokerConfig;
use crate::state::StateStore;

/// Lifecycle of the single broker connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Point-in-time view of the link, served by the gateway status endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct LinkStatus {
    pub connection_state: ConnectionState,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub last_activity: Option<DateTime<Local>>,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The connection is currently down. Reported, not thrown: callers get
    /// an explicit failure instead of a silently queued message.
    #[error("not connected to the broker")]
    NotConnected,

    #[error("publish failed: {0}")]
    Publish(#[from] rumqttc::ClientError),
}

/// Capped exponential retry schedule for reconnect attempts.
#[derive(Debug)]
struct Backoff {
    base: Duration,
    cap: Duration,
    next: Duration,
}

impl Backoff {
    fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            next: base,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (delay * 2).min(self.cap);
        delay
    }

    fn reset(&mut self) {
        self.next = self.base;
    }
}

/// State shared between the worker task and every [`BrokerLink`] clone.
#[derive(Debug)]
struct LinkShared {
    state_tx: watch::Sender<ConnectionState>,
    messages_received: AtomicUsize,
    messages_sent: AtomicUsize,
    last_activity: Mutex<Option<DateTime<Local>>>,
}

impl LinkShared {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn note_activity(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
        let mut last = self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(Local::now());
    }

    fn last_activity(&self) -> Option<DateTime<Local>> {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to the broker connection.
///
/// Cheap to clone; all clones talk to the one worker task spawned by
/// [`BrokerLink::spawn`].
#[derive(Clone, Debug)]
pub struct BrokerLink {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
    shared: Arc<LinkShared>,
}

impl BrokerLink {
    /// Builds the MQTT client and spawns the network worker task.
    ///
    /// The worker connects, subscribes to every configured topic, feeds
    /// inbound messages through `store` and `bus`, and keeps reconnecting
    /// with a capped exponential backoff until `shutdown` is cancelled.
    pub fn spawn(
        config: BrokerConfig,
        store: Arc<StateStore>,
        bus: ChangeBus,
        shutdown: CancellationToken,
    ) -> (BrokerLink, JoinHandle<()>) {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        if !config.username.is_empty() {
            options.set_credentials(config.username.clone(), config.password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(LinkShared {
            state_tx,
            messages_received: AtomicUsize::new(0),
            messages_sent: AtomicUsize::new(0),
            last_activity: Mutex::new(None),
        });

        let link = BrokerLink {
            client: client.clone(),
            state: state_rx,
            shared: Arc::clone(&shared),
        };
        let worker = Worker {
            client,
            eventloop,
            config,
            store,
            bus,
            shared,
            shutdown,
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(60)),
        };
        let handle = tokio::spawn(worker.run());

        (link, handle)
    }

    /// Non-blocking connection status query.
    pub fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            connection_state: *self.state.borrow(),
            messages_received: self.shared.messages_received.load(Ordering::Relaxed),
            messages_sent: self.shared.messages_sent.load(Ordering::Relaxed),
            last_activity: self.shared.last_activity(),
        }
    }

    /// Publishes an outbound message at QoS 0, non-retained.
    ///
    /// Fails fast with [`LinkError::NotConnected`] while the link is down.
    /// Success means the message was handed to the broker connection, not
    /// that the device confirmed it.
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<(), LinkError> {
        if !self.is_connected() {
            warn!(topic, "dropping outbound message, broker link is down");
            return Err(LinkError::NotConnected);
        }
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        self.shared.note_activity(&self.shared.messages_sent);
        info!(topic, payload, "published command");
        Ok(())
    }

    /// Publishes a "change setting" command in the device's encoding.
    pub async fn change_setting(&self, name: &str, value: &str) -> Result<(), LinkError> {
        self.publish(
            command::CHANGE_SETTING_TOPIC,
            &command::encode_setting_change(name, value),
        )
        .await
    }

    /// Asks the device to emit its current settings on `send_settings`.
    pub async fn request_settings(&self) -> Result<(), LinkError> {
        self.publish(
            command::SETTINGS_REQUEST_TOPIC,
            command::SETTINGS_REQUEST_PAYLOAD,
        )
        .await
    }
}

/// The network worker owning the rumqttc event loop.
struct Worker {
    client: AsyncClient,
    eventloop: EventLoop,
    config: BrokerConfig,
    store: Arc<StateStore>,
    bus: ChangeBus,
    shared: Arc<LinkShared>,
    shutdown: CancellationToken,
    backoff: Backoff,
}

impl Worker {
    async fn run(mut self) {
        let shutdown = self.shutdown.clone();
        self.shared.set_state(ConnectionState::Connecting);
        info!(
            host = %self.config.host,
            port = self.config.port,
            topics = self.config.topics.len(),
            "connecting to MQTT broker"
        );

        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => None,
                polled = self.eventloop.poll() => Some(polled),
            };

            match polled {
                None => break,
                Some(Ok(event)) => self.handle_event(event).await,
                Some(Err(err)) => {
                    let delay = self.backoff.next_delay();
                    error!(error = %err, ?delay, "broker connection error, backing off");
                    self.shared.set_state(ConnectionState::Reconnecting);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("broker worker shutting down");
        let _ = self.client.disconnect().await;
        self.shared.set_state(ConnectionState::Disconnected);
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                info!("connected to MQTT broker");
                self.shared.set_state(ConnectionState::Connected);
                self.backoff.reset();
                // Clean-session semantics: subscriptions do not survive a
                // reconnect, so they are re-issued on every ConnAck.
                for topic in &self.config.topics {
                    match self.client.subscribe(topic.clone(), QoS::AtMostOnce).await {
                        Ok(()) => debug!(topic = %topic, "subscribed"),
                        Err(err) => warn!(topic = %topic, error = %err, "subscribe failed"),
                    }
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let text = match String::from_utf8(publish.payload.to_vec()) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(
                            topic = %publish.topic,
                            error = %err,
                            "dropping message with invalid UTF-8 payload"
                        );
                        return;
                    }
                };
                debug!(topic = %publish.topic, payload = %text, "message received");
                let event = self.store.ingest(&publish.topic, &text).await;
                self.bus.publish(event);
                self.shared.note_activity(&self.shared.messages_received);
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("broker requested disconnect");
                self.shared.set_state(ConnectionState::Reconnecting);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn publish_fails_fast_while_disconnected() {
        let store = Arc::new(StateStore::new());
        let bus = ChangeBus::new();
        let shutdown = CancellationToken::new();
        let config = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..BrokerConfig::default()
        };

        let (link, handle) = BrokerLink::spawn(config, store, bus, shutdown.clone());

        assert!(!link.is_connected());
        let err = link.publish("changeSetting", "x").await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        let err = link.change_setting("pump", "on").await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn status_starts_empty() {
        let store = Arc::new(StateStore::new());
        let bus = ChangeBus::new();
        let shutdown = CancellationToken::new();
        let config = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..BrokerConfig::default()
        };

        let (link, handle) = BrokerLink::spawn(config, store, bus, shutdown.clone());
        let status = link.status();
        assert_eq!(status.messages_received, 0);
        assert_eq!(status.messages_sent, 0);
        assert!(status.last_activity.is_none());
        assert_ne!(status.connection_state, ConnectionState::Connected);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
