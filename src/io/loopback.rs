//! In-process transport for tests and local simulation
//!
//! Every `open` hands the server side of the new connection to the
//! `LoopbackPeers` receiver. Dropping a `LoopbackPeer` looks like a lost
//! connection to the channel.

use crate::error::ConnectionError;
use crate::io::transport::{Connection, Credentials, OutboundEvent, Transport, TransportEvent};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const LOOPBACK_BUFFER: usize = 64;

struct Inner {
    peers_tx: mpsc::UnboundedSender<LoopbackPeer>,
    refuse: AtomicU32,
    opens: AtomicU64,
}

#[derive(Clone)]
pub struct LoopbackTransport {
    inner: Arc<Inner>,
}

/// Server side of loopback connections, in open order
pub struct LoopbackPeers {
    rx: mpsc::UnboundedReceiver<LoopbackPeer>,
}

impl LoopbackPeers {
    pub async fn accept(&mut self) -> Option<LoopbackPeer> {
        self.rx.recv().await
    }
}

/// Server end of one loopback connection
pub struct LoopbackPeer {
    endpoint: String,
    credentials: Credentials,
    events: mpsc::Sender<TransportEvent>,
    emitted: mpsc::Receiver<OutboundEvent>,
}

impl LoopbackPeer {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Push an event to the client. False once the client side is gone.
    pub async fn send(&self, name: &str, payload: Value) -> bool {
        self.events.send(TransportEvent { name: name.to_string(), payload }).await.is_ok()
    }

    /// Next event the client emitted
    pub async fn next_emitted(&mut self) -> Option<OutboundEvent> {
        self.emitted.recv().await
    }

    /// Resolves once the client side has let go of the connection
    pub async fn closed(&self) {
        self.events.closed().await
    }

    /// Drop the connection from the server side
    pub fn disconnect(self) {
        debug!(endpoint = %self.endpoint, "loopback_peer_disconnect");
    }
}

impl LoopbackTransport {
    pub fn new() -> (Self, LoopbackPeers) {
        let (peers_tx, rx) = mpsc::unbounded_channel();
        let inner = Inner { peers_tx, refuse: AtomicU32::new(0), opens: AtomicU64::new(0) };
        (Self { inner: Arc::new(inner) }, LoopbackPeers { rx })
    }

    /// Fail the next `count` opens with `ConnectionError::Unavailable`
    pub fn refuse_next(&self, count: u32) {
        self.inner.refuse.store(count, Ordering::SeqCst);
    }

    /// Open attempts so far, refused ones included
    pub fn opens(&self) -> u64 {
        self.inner.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn open(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<Connection, ConnectionError> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .inner
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ConnectionError::Unavailable("loopback refused".to_string()));
        }

        let (events, inbound) = mpsc::channel(LOOPBACK_BUFFER);
        let (outbound, emitted) = mpsc::channel(LOOPBACK_BUFFER);
        let peer = LoopbackPeer {
            endpoint: endpoint.to_string(),
            credentials: credentials.clone(),
            events,
            emitted,
        };
        self.inner
            .peers_tx
            .send(peer)
            .map_err(|_| ConnectionError::Unavailable("loopback server gone".to_string()))?;

        Ok(Connection { inbound, outbound })
    }
}
