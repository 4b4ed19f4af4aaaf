//! Socket.IO over WebSocket transport
//!
//! Connection sequence:
//! 1. Dial `ws(s)://host/socket.io/?EIO=4&transport=websocket`
//! 2. Wait for the Engine.IO open packet (ping interval / timeout)
//! 3. Send the Socket.IO connect packet with `{"token": ...}` auth
//! 4. Wait for the connect ack (or connect_error)
//!
//! After that a single pump task owns the socket: it answers pings,
//! forwards namespace events to `Connection::inbound` and writes
//! `Connection::outbound` events. The pump exits (closing `inbound`) on
//! server close, read error, or when no ping arrives within
//! `pingInterval + pingTimeout`.

use crate::error::ConnectionError;
use crate::infra::config::Config;
use crate::io::socketio::{self, Handshake, Packet, SocketPacket};
use crate::io::transport::{
    validate_endpoint, Connection, Credentials, OutboundEvent, Transport, TransportEvent,
};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const SOCKET_IO_PATH: &str = "/socket.io/";
const OUTBOUND_BUFFER: usize = 64;

#[cold]
fn log_read_error(e: &tokio_tungstenite::tungstenite::Error) {
    error!(error = %e, "ws_read_error");
}

#[cold]
fn log_write_error(e: &tokio_tungstenite::tungstenite::Error) {
    error!(error = %e, "ws_write_error");
}

#[cold]
fn log_decode_error(e: &socketio::CodecError) {
    warn!(error = %e, "ws_packet_decode_failed");
}

#[cold]
fn log_ping_timeout(liveness: Duration) {
    warn!(liveness_ms = liveness.as_millis() as u64, "ws_ping_timeout");
}

/// Map a backend endpoint onto its Engine.IO websocket URL
pub fn socket_url(endpoint: &str) -> Result<Url, ConnectionError> {
    let mut url = validate_endpoint(endpoint)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        _ => "wss",
    };
    url.set_scheme(scheme).map_err(|_| ConnectionError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: format!("cannot use scheme {scheme}"),
    })?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(SOCKET_IO_PATH);
    }
    if !url.query_pairs().any(|(key, _)| key == "EIO") {
        url.query_pairs_mut().append_pair("EIO", "4").append_pair("transport", "websocket");
    }
    Ok(url)
}

/// Human readable reason from a connect_error payload
fn rejection_reason(data: Option<&Value>) -> String {
    match data {
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "connect_error".to_string(),
    }
}

/// Collapse event arguments into one payload value
fn event_payload(mut args: Vec<Value>) -> Value {
    match args.len() {
        0 => Value::Null,
        1 => args.remove(0),
        _ => Value::Array(args),
    }
}

pub struct WsTransport {
    namespace: String,
    connect_timeout: Duration,
    frame_buffer: usize,
}

impl WsTransport {
    pub fn new(namespace: &str, connect_timeout: Duration, frame_buffer: usize) -> Self {
        Self {
            namespace: namespace.to_string(),
            connect_timeout,
            frame_buffer: frame_buffer.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.namespace(), config.connect_timeout(), config.frame_buffer())
    }

    async fn dial(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<(WsSink, WsSource, Handshake), ConnectionError> {
        let url = socket_url(endpoint)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectionError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        if let Some(token) = credentials.token.as_deref() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }

        info!(url = %url, "ws_connecting");
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| ConnectionError::Unavailable(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let handshake = loop {
            match next_packet(&mut source).await? {
                Packet::Open(handshake) => break handshake,
                other => debug!(packet = ?other, "ws_packet_before_open_ignored"),
            }
        };

        let auth = credentials.token.as_ref().map(|token| json!({ "token": token }));
        let connect = SocketPacket::Connect { namespace: self.namespace.clone(), data: auth };
        send_packet(&mut sink, &Packet::Message(connect))
            .await
            .map_err(|e| ConnectionError::Unavailable(e.to_string()))?;

        loop {
            match next_packet(&mut source).await? {
                Packet::Ping(probe) => {
                    send_packet(&mut sink, &Packet::Pong(probe))
                        .await
                        .map_err(|e| ConnectionError::Unavailable(e.to_string()))?;
                }
                Packet::Message(SocketPacket::Connect { namespace, .. })
                    if namespace == self.namespace =>
                {
                    break;
                }
                Packet::Message(SocketPacket::ConnectError { data, .. }) => {
                    return Err(ConnectionError::Rejected(rejection_reason(data.as_ref())));
                }
                Packet::Close => return Err(ConnectionError::Closed),
                other => debug!(packet = ?other, "ws_packet_before_connect_ignored"),
            }
        }

        info!(
            sid = %handshake.sid,
            namespace = %self.namespace,
            ping_interval_ms = handshake.ping_interval,
            ping_timeout_ms = handshake.ping_timeout,
            "ws_connected"
        );
        Ok((sink, source, handshake))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<Connection, ConnectionError> {
        let (sink, source, handshake) =
            tokio::time::timeout(self.connect_timeout, self.dial(endpoint, credentials))
                .await
                .map_err(|_| ConnectionError::Unavailable("connect timed out".to_string()))??;

        let (inbound_tx, inbound) = mpsc::channel(self.frame_buffer);
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
        let namespace = self.namespace.clone();

        tokio::spawn(async move {
            pump(sink, source, inbound_tx, outbound_rx, namespace, liveness).await;
            debug!("ws_pump_exited");
        });

        Ok(Connection { inbound, outbound })
    }
}

/// Next decodable Engine.IO packet; transport errors end the handshake
async fn next_packet(source: &mut WsSource) -> Result<Packet, ConnectionError> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => match socketio::decode(&text) {
                Ok(packet) => return Ok(packet),
                Err(e) => log_decode_error(&e),
            },
            Some(Ok(Message::Close(_))) | None => return Err(ConnectionError::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ConnectionError::Unavailable(e.to_string())),
        }
    }
}

async fn send_packet(
    sink: &mut WsSink,
    packet: &Packet,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    sink.send(Message::Text(socketio::encode(packet))).await
}

async fn pump(
    mut sink: WsSink,
    mut source: WsSource,
    inbound: mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::Receiver<OutboundEvent>,
    namespace: String,
    liveness: Duration,
) {
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => match socketio::decode(&text) {
                    Ok(Packet::Ping(probe)) => {
                        deadline = Instant::now() + liveness;
                        if let Err(e) = send_packet(&mut sink, &Packet::Pong(probe)).await {
                            log_write_error(&e);
                            return;
                        }
                    }
                    Ok(Packet::Message(SocketPacket::Event { namespace: ns, name, args, .. }))
                        if ns == namespace =>
                    {
                        let event = TransportEvent { name, payload: event_payload(args) };
                        if inbound.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(Packet::Message(SocketPacket::Disconnect { namespace: ns })) if ns == namespace => {
                        info!(namespace = %ns, "ws_server_disconnect");
                        return;
                    }
                    Ok(Packet::Close) => {
                        info!("ws_server_close");
                        return;
                    }
                    Ok(other) => debug!(packet = ?other, "ws_packet_ignored"),
                    Err(e) => log_decode_error(&e),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "ws_closed");
                    return;
                }
                None => {
                    info!("ws_stream_ended");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log_read_error(&e);
                    return;
                }
            },
            out = outbound.recv() => match out {
                Some(event) => {
                    let packet = Packet::Message(SocketPacket::Event {
                        namespace: namespace.clone(),
                        ack_id: None,
                        name: event.name,
                        args: event.args,
                    });
                    if let Err(e) = send_packet(&mut sink, &packet).await {
                        log_write_error(&e);
                        return;
                    }
                }
                None => {
                    close_socket(&mut sink, &namespace).await;
                    return;
                }
            },
            _ = inbound.closed() => {
                close_socket(&mut sink, &namespace).await;
                return;
            }
            _ = tokio::time::sleep_until(deadline) => {
                log_ping_timeout(liveness);
                return;
            }
        }
    }
}

/// Best-effort namespace disconnect followed by a websocket close
async fn close_socket(sink: &mut WsSink, namespace: &str) {
    let disconnect = Packet::Message(SocketPacket::Disconnect { namespace: namespace.to_string() });
    let _ = send_packet(sink, &disconnect).await;
    let _ = sink.close().await;
    debug!(namespace = %namespace, "ws_client_disconnect");
}
