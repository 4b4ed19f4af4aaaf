//! Realtime location channel
//!
//! A `Connector` hands out one shared `Channel` per endpoint. The channel
//! owns the handler registry and a background connection task that:
//! - announces the session (`join`, `joinRoom`) after every (re)connect
//! - decodes inbound events and dispatches them in arrival order
//! - reconnects with capped exponential backoff when the transport drops
//!
//! Transport failures after `connect` only show up in `status()`. Dropping
//! the last `Arc<Channel>` stops the task and closes the transport.

mod connection;

use crate::domain::types::LocationEvent;
use crate::error::ConnectionError;
use crate::infra::backoff::Backoff;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::transport::{validate_endpoint, Connection, Credentials, OutboundEvent, Transport};
use crate::services::registry::{HandlerRegistry, RegistrationId};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared between a `Channel` and its connection task
pub(crate) struct Shared {
    endpoint: String,
    credentials: Credentials,
    registry: Arc<HandlerRegistry<LocationEvent>>,
    status: watch::Sender<ConnectionStatus>,
    /// Sender of the live connection, if any
    outbound: Mutex<Option<mpsc::Sender<OutboundEvent>>>,
    metrics: Arc<Metrics>,
    running: AtomicBool,
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(endpoint = %self.endpoint, from = %previous, to = %status, "channel_status");
        }
    }

    fn mark_connected(&self) {
        self.metrics.record_connect();
        self.set_status(ConnectionStatus::Connected);
        info!(endpoint = %self.endpoint, "channel_connected");
    }

    /// Last thing the task does; `running` flips after the final status
    fn mark_stopped(&self) {
        *self.outbound.lock() = None;
        self.set_status(ConnectionStatus::Disconnected);
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct Channel {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    backoff: Backoff,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

impl Channel {
    fn new(
        endpoint: &str,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        backoff: Backoff,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let (shutdown, _) = watch::channel(false);
        let shared = Shared {
            endpoint: endpoint.to_string(),
            credentials,
            registry: Arc::new(HandlerRegistry::new()),
            status,
            outbound: Mutex::new(None),
            metrics,
            running: AtomicBool::new(false),
        };
        Self { shared: Arc::new(shared), transport, backoff, shutdown }
    }

    /// Publish Connected and hand the connection to a fresh task
    fn start(&self, conn: Connection) {
        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.mark_connected();
        tokio::spawn(connection::run(
            self.shared.clone(),
            self.transport.clone(),
            self.backoff.clone(),
            self.shutdown.subscribe(),
            conn,
        ));
    }

    /// Register `handler` for `event_name`, replacing any previous handler.
    ///
    /// Dropping (or closing) the returned handle unsubscribes, unless the
    /// handler has since been replaced.
    pub fn subscribe<F>(&self, event_name: &str, handler: F) -> ChannelHandle
    where
        F: Fn(&LocationEvent) + Send + Sync + 'static,
    {
        let id = self.shared.registry.register(event_name, Arc::new(handler));
        debug!(event = %event_name, "channel_subscribed");
        ChannelHandle {
            event_name: event_name.to_string(),
            id,
            registry: Arc::downgrade(&self.shared.registry),
        }
    }

    /// Remove the handler for `event_name`; no-op when none is registered.
    /// No dispatch to the removed handler happens after this returns.
    pub fn unsubscribe(&self, event_name: &str) {
        if self.shared.registry.remove(event_name) {
            debug!(event = %event_name, "channel_unsubscribed");
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.status.borrow() == ConnectionStatus::Connected
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Queue an event to the server. False when disconnected or backed up.
    pub fn emit(&self, name: &str, args: Vec<Value>) -> bool {
        let sender = self.shared.outbound.lock().clone();
        match sender {
            Some(sender) => sender.try_send(OutboundEvent::new(name, args)).is_ok(),
            None => false,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.shared.metrics
    }

    /// False once reconnect attempts are exhausted
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Subscription token returned by `Channel::subscribe`
#[must_use = "dropping a ChannelHandle unsubscribes its handler"]
pub struct ChannelHandle {
    event_name: String,
    id: RegistrationId,
    registry: Weak<HandlerRegistry<LocationEvent>>,
}

impl ChannelHandle {
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Still the registered handler for its event
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|r| r.is_current(&self.event_name, self.id))
    }

    /// Unsubscribe now; same as dropping the handle
    pub fn close(self) {}
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove_registration(&self.event_name, self.id) {
                debug!(event = %self.event_name, "channel_handle_closed");
            }
        }
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("event_name", &self.event_name)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Opens and shares realtime channels
pub struct Connector {
    transport: Arc<dyn Transport>,
    backoff: Backoff,
    metrics: Arc<Metrics>,
    current: Mutex<Option<Weak<Channel>>>,
    /// Serializes `connect` so concurrent callers share one transport
    connecting: tokio::sync::Mutex<()>,
}

impl Connector {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            backoff: Backoff::from_config(config),
            metrics: Arc::new(Metrics::new()),
            current: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Live channel from the last successful `connect`, if still held
    pub fn current(&self) -> Option<Arc<Channel>> {
        self.current.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Open the realtime channel, or return the one already open for
    /// `endpoint`. A channel whose reconnects were exhausted is reopened in
    /// place, keeping its subscriptions.
    pub async fn connect(
        &self,
        endpoint: &str,
        credentials: Credentials,
    ) -> Result<Arc<Channel>, ConnectionError> {
        validate_endpoint(endpoint)?;
        let _serial = self.connecting.lock().await;

        if let Some(channel) = self.current() {
            if channel.endpoint() == endpoint {
                if channel.is_running() {
                    debug!(endpoint = %endpoint, "channel_reused");
                    return Ok(channel);
                }
                info!(endpoint = %endpoint, "channel_reopening");
                channel.shared.set_status(ConnectionStatus::Connecting);
                let connection =
                    match self.transport.open(endpoint, &channel.shared.credentials).await {
                        Ok(connection) => connection,
                        Err(e) => {
                            channel.shared.set_status(ConnectionStatus::Disconnected);
                            return Err(e);
                        }
                    };
                channel.start(connection);
                return Ok(channel);
            }
            info!(from = %channel.endpoint(), to = %endpoint, "channel_endpoint_changed");
        }

        info!(endpoint = %endpoint, "channel_connecting");
        let connection = self.transport.open(endpoint, &credentials).await?;
        let channel = Arc::new(Channel::new(
            endpoint,
            credentials,
            self.transport.clone(),
            self.backoff.clone(),
            self.metrics.clone(),
        ));
        channel.start(connection);
        *self.current.lock() = Some(Arc::downgrade(&channel));
        Ok(channel)
    }
}
