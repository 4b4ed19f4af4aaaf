//! Connection task: pump, dispatch, reconnect

use super::{ConnectionStatus, Shared};
use crate::domain::types::LocationEvent;
use crate::infra::backoff::Backoff;
use crate::io::transport::{Connection, Transport, TransportEvent};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, PartialEq, Eq)]
enum Ended {
    Shutdown,
    Lost,
}

#[cold]
fn log_decode_failed(event: &str, e: &serde_json::Error) {
    warn!(event = %event, error = %e, "channel_event_decode_failed");
}

#[cold]
fn log_handler_panicked(event: &str, payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    error!(event = %event, panic = %message, "channel_handler_panicked");
}

#[cold]
fn log_reconnect_exhausted(endpoint: &str, attempts: u32) {
    error!(endpoint = %endpoint, attempts, "channel_reconnect_exhausted");
}

pub(super) async fn run(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    mut backoff: Backoff,
    mut shutdown: watch::Receiver<bool>,
    mut connection: Connection,
) {
    loop {
        announce(&shared, &connection).await;
        let ended = pump(&shared, &mut connection.inbound, &mut shutdown).await;
        *shared.outbound.lock() = None;
        drop(connection);

        if ended == Ended::Shutdown {
            info!(endpoint = %shared.endpoint, "channel_shutdown");
            break;
        }
        warn!(endpoint = %shared.endpoint, "channel_connection_lost");

        match reconnect(&shared, transport.as_ref(), &mut backoff, &mut shutdown).await {
            Some(next) => {
                connection = next;
                backoff.reset();
                shared.mark_connected();
            }
            None => break,
        }
    }
    shared.mark_stopped();
}

/// Queue the session joins, then open `emit` to callers
async fn announce(shared: &Shared, connection: &Connection) {
    for event in shared.credentials.join_events() {
        let name = event.name.clone();
        if connection.outbound.send(event).await.is_err() {
            debug!(event = %name, "channel_join_not_sent");
            return;
        }
        debug!(event = %name, "channel_join_sent");
    }
    *shared.outbound.lock() = Some(connection.outbound.clone());
}

async fn pump(
    shared: &Shared,
    inbound: &mut mpsc::Receiver<TransportEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> Ended {
    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ended::Shutdown;
                }
            }
            frame = inbound.recv() => match frame {
                Some(event) => deliver(shared, event),
                None => return Ended::Lost,
            },
        }
    }
}

/// Decode and dispatch one event on the connection task
fn deliver(shared: &Shared, event: TransportEvent) {
    shared.metrics.record_event_received();

    if !shared.registry.contains(&event.name) {
        shared.metrics.record_unhandled();
        debug!(event = %event.name, "channel_event_unhandled");
        return;
    }

    let location: LocationEvent = match serde_json::from_value(event.payload) {
        Ok(location) => location,
        Err(e) => {
            shared.metrics.record_decode_error();
            log_decode_failed(&event.name, &e);
            return;
        }
    };

    // Handler panics stop at this frame; the task keeps pumping
    let start = Instant::now();
    let dispatched =
        panic::catch_unwind(AssertUnwindSafe(|| shared.registry.dispatch(&event.name, &location)));
    match dispatched {
        Ok(true) => shared.metrics.record_dispatch(start.elapsed().as_micros() as u64),
        // Unsubscribed between the lookup and the dispatch
        Ok(false) => shared.metrics.record_unhandled(),
        Err(payload) => {
            shared.metrics.record_handler_panic();
            log_handler_panicked(&event.name, payload.as_ref());
        }
    }
}

/// Retry the transport until it opens, attempts run out, or shutdown
async fn reconnect(
    shared: &Shared,
    transport: &dyn Transport,
    backoff: &mut Backoff,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Connection> {
    loop {
        let Some(delay) = backoff.next_delay() else {
            log_reconnect_exhausted(&shared.endpoint, backoff.attempt());
            return None;
        };

        shared.set_status(ConnectionStatus::Connecting);
        shared.metrics.record_reconnect();
        info!(
            endpoint = %shared.endpoint,
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "channel_reconnect_scheduled"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return None,
        }

        tokio::select! {
            opened = transport.open(&shared.endpoint, &shared.credentials) => match opened {
                Ok(connection) => return Some(connection),
                Err(e) => {
                    warn!(endpoint = %shared.endpoint, error = %e, "channel_reconnect_failed");
                }
            },
            _ = shutdown.changed() => return None,
        }
    }
}
