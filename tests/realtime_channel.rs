//! Realtime channel over a real websocket against an in-process Socket.IO peer

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use zovo_core::domain::types::{LocationEvent, Role};
use zovo_core::error::ConnectionError;
use zovo_core::infra::Config;
use zovo_core::io::socketio::{self, Handshake, Packet, SocketPacket};
use zovo_core::io::{Credentials, WsTransport};
use zovo_core::services::{Channel, ConnectionStatus, Connector};

const WAIT: Duration = Duration::from_secs(5);

/// What the server saw from one client session
#[derive(Debug)]
struct Session {
    auth: Option<Value>,
    emitted: Vec<(String, Vec<Value>)>,
}

/// Serve `sessions` clients. Each gets the packets from `script` after the
/// connect ack, then its socket is dropped. A token other than `accept`
/// is rejected with connect_error. The first session also waits for the
/// client to emit `ready` so the test can subscribe first.
async fn serve(accept: &'static str, script: Vec<Value>, sessions: usize) -> (String, UnboundedReceiver<Session>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = unbounded_channel();

    tokio::spawn(async move {
        for n in 0..sessions {
            let (stream, _) = listener.accept().await.unwrap();
            serve_one(stream, accept, &script, n, &tx).await;
        }
    });

    (format!("http://{addr}"), rx)
}

async fn serve_one(
    stream: tokio::net::TcpStream,
    accept: &str,
    script: &[Value],
    n: usize,
    sessions: &UnboundedSender<Session>,
) {
    let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let (mut sink, mut source) = ws.split();
    let send = |p: Packet| Message::Text(socketio::encode(&p));

    let open = Handshake {
        sid: format!("s{n}"),
        upgrades: Vec::new(),
        ping_interval: 25_000,
        ping_timeout: 20_000,
        max_payload: None,
    };
    sink.send(send(Packet::Open(open))).await.unwrap();

    let Some(Ok(Message::Text(raw))) = source.next().await else { return };
    let Ok(Packet::Message(SocketPacket::Connect { namespace, data })) = socketio::decode(&raw)
    else {
        panic!("expected connect, got {raw}");
    };
    let token = data.as_ref().and_then(|d| d.get("token")).and_then(Value::as_str);
    if token != Some(accept) {
        let reject = SocketPacket::ConnectError {
            namespace,
            data: Some(json!({ "message": "Authentication error" })),
        };
        let _ = sink.send(send(Packet::Message(reject))).await;
        return;
    }
    let ack = SocketPacket::Connect { namespace, data: Some(json!({ "sid": format!("s{n}") })) };
    sink.send(send(Packet::Message(ack))).await.unwrap();

    // join + joinRoom arrive right after the ack
    let expected = if n == 0 { 3 } else { 2 };
    let mut emitted = Vec::new();
    while emitted.len() < expected {
        match source.next().await {
            Some(Ok(Message::Text(raw))) => {
                if let Ok(Packet::Message(SocketPacket::Event { name, args, .. })) =
                    socketio::decode(&raw)
                {
                    emitted.push((name, args));
                }
            }
            _ => break,
        }
    }

    for payload in script {
        let event = SocketPacket::event("locationUpdate", vec![payload.clone()]);
        sink.send(send(Packet::Message(event))).await.unwrap();
    }
    let _ = sessions.send(Session { auth: data, emitted });

    // hold the socket until the client has drained the script
    tokio::time::sleep(Duration::from_millis(100)).await;
}

fn update(worker: &str, lat: f64) -> Value {
    json!({
        "workerId": worker,
        "latitude": lat,
        "longitude": 77.6,
        "timestamp": 1_767_631_290_048u64
    })
}

/// `emit` opens once the session joins are queued
async fn emit_ready(channel: &Channel) {
    timeout(WAIT, async {
        while !channel.emit("ready", Vec::new()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

fn credentials(token: &str) -> Credentials {
    Credentials {
        token: Some(token.to_string()),
        user_id: Some("w1".to_string()),
        role: Some(Role::Worker),
    }
}

fn connector(max_attempts: u32) -> Connector {
    let config = Config::default().with_reconnect(10, 50, max_attempts);
    Connector::new(Arc::new(WsTransport::from_config(&config)), &config)
}

#[tokio::test]
async fn test_events_delivered_in_order_over_websocket() {
    let script = vec![update("w1", 12.1), update("w1", 12.2), update("w1", 12.3)];
    let (endpoint, mut sessions) = serve("secret", script, 1).await;

    let connector = connector(0);
    let channel = connector.connect(&endpoint, credentials("secret")).await.unwrap();
    assert!(channel.is_connected());

    let (tx, mut rx) = unbounded_channel::<LocationEvent>();
    let _handle = channel.subscribe("locationUpdate", move |e: &LocationEvent| {
        let _ = tx.send(e.clone());
    });
    emit_ready(&channel).await;

    let session = timeout(WAIT, sessions.recv()).await.unwrap().unwrap();
    assert_eq!(session.auth, Some(json!({ "token": "secret" })));
    assert_eq!(session.emitted[0], ("join".to_string(), vec![json!("w1")]));
    assert_eq!(session.emitted[1], ("joinRoom".to_string(), vec![json!("worker-w1")]));
    assert_eq!(session.emitted[2].0, "ready");

    let mut seen = Vec::new();
    for _ in 0..3 {
        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        seen.push(event.latitude);
    }
    assert_eq!(seen, vec![12.1, 12.2, 12.3]);
}

#[tokio::test]
async fn test_rejected_token_fails_connect() {
    let (endpoint, _sessions) = serve("secret", Vec::new(), 1).await;

    let err = connector(0).connect(&endpoint, credentials("wrong")).await.unwrap_err();
    assert_eq!(err, ConnectionError::Rejected("Authentication error".to_string()));
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = connector(0)
        .connect(&format!("http://{addr}"), credentials("secret"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::Unavailable(_)));
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let (endpoint, mut sessions) = serve("secret", vec![update("w1", 1.0)], 2).await;

    let connector = connector(5);
    let channel = connector.connect(&endpoint, credentials("secret")).await.unwrap();

    let (tx, mut rx) = unbounded_channel::<LocationEvent>();
    let _handle = channel.subscribe("locationUpdate", move |e: &LocationEvent| {
        let _ = tx.send(e.clone());
    });
    emit_ready(&channel).await;

    // one update per session; the second arrives only after a reconnect
    for _ in 0..2 {
        timeout(WAIT, sessions.recv()).await.unwrap().unwrap();
        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.latitude, 1.0);
    }
    assert_eq!(channel.metrics().connects_total(), 2);

    // server is gone for good: reconnects exhaust and the channel stops
    timeout(WAIT, async {
        while channel.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(channel.status(), ConnectionStatus::Disconnected);
}
