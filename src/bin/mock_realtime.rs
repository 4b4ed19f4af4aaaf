//! Mock realtime server
//!
//! Serves Engine.IO v4 / Socket.IO v5 over websocket for local runs of
//! `zovo-core track`.
//!
//! Behavior:
//! 1. Listens on configurable port (default 5000), any path
//! 2. Sends the Engine.IO open packet, then acks the Socket.IO connect
//!    (or rejects it with connect_error when --token does not match)
//! 3. Emits `locationUpdate` for a simulated worker walking between two
//!    points, and pings at the advertised interval
//! 4. Logs `join` / `joinRoom` emitted by the client
//!
//! Usage:
//!   cargo run --bin mock_realtime -- --port 5000 --interval-ms 1000
//!   SOCKET_URL=http://127.0.0.1:5000 cargo run -- track

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;
use zovo_core::io::socketio::{self, Handshake, Packet, SocketPacket};

#[derive(Parser, Debug, Clone)]
#[command(name = "mock_realtime")]
#[command(about = "Mock Socket.IO server emitting worker location updates")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "5000")]
    port: u16,

    /// Delay between location updates (ms)
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Simulated worker id
    #[arg(long, default_value = "w1")]
    worker_id: String,

    /// Event name for location updates
    #[arg(long, default_value = "locationUpdate")]
    event: String,

    /// Start position
    #[arg(long, default_value = "12.9352")]
    from_lat: f64,
    #[arg(long, default_value = "77.6245")]
    from_lng: f64,

    /// Destination position
    #[arg(long, default_value = "12.9716")]
    to_lat: f64,
    #[arg(long, default_value = "77.5946")]
    to_lng: f64,

    /// Updates per leg of the walk
    #[arg(long, default_value = "60")]
    steps: u32,

    /// Advertised ping interval (ms)
    #[arg(long, default_value = "25000")]
    ping_interval_ms: u64,

    /// Advertised ping timeout (ms)
    #[arg(long, default_value = "20000")]
    ping_timeout_ms: u64,

    /// Reject clients whose auth token differs
    #[arg(long)]
    token: Option<String>,
}

/// Position after `step` updates, walking there and back
fn position_at(args: &Args, step: u64) -> (f64, f64) {
    let steps = u64::from(args.steps.max(1));
    let phase = step % (2 * steps);
    let t = if phase <= steps { phase as f64 / steps as f64 } else { (2 * steps - phase) as f64 / steps as f64 };
    (
        args.from_lat + (args.to_lat - args.from_lat) * t,
        args.from_lng + (args.to_lng - args.from_lng) * t,
    )
}

fn text(packet: &Packet) -> Message {
    Message::Text(socketio::encode(packet))
}

fn token_of(data: Option<&Value>) -> Option<&str> {
    data?.get("token")?.as_str()
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, peer: std::net::SocketAddr, args: Args) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("[MOCK] Websocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();
    let sid = Uuid::now_v7().simple().to_string();
    println!("[MOCK] Client connected from {} (sid {})", peer, sid);

    let open = Packet::Open(Handshake {
        sid: sid.clone(),
        upgrades: Vec::new(),
        ping_interval: args.ping_interval_ms,
        ping_timeout: args.ping_timeout_ms,
        max_payload: Some(1_000_000),
    });
    if sink.send(text(&open)).await.is_err() {
        return;
    }

    // Wait for the Socket.IO connect
    loop {
        let Some(Ok(Message::Text(raw))) = source.next().await else {
            println!("[MOCK] {} left before connecting", peer);
            return;
        };
        match socketio::decode(&raw) {
            Ok(Packet::Message(SocketPacket::Connect { namespace, data })) => {
                let presented = token_of(data.as_ref());
                if args.token.is_some() && args.token.as_deref() != presented {
                    let reject = SocketPacket::ConnectError {
                        namespace,
                        data: Some(json!({ "message": "Authentication error" })),
                    };
                    let _ = sink.send(text(&Packet::Message(reject))).await;
                    let _ = sink.close().await;
                    println!("[MOCK] Rejected {} (bad token)", peer);
                    return;
                }
                let ack = SocketPacket::Connect { namespace, data: Some(json!({ "sid": sid })) };
                if sink.send(text(&Packet::Message(ack))).await.is_err() {
                    return;
                }
                println!("[MOCK] Socket.IO connect from {} (auth: {})", peer, presented.is_some());
                break;
            }
            Ok(other) => println!("[MOCK] Ignoring {:?} before connect", other),
            Err(e) => eprintln!("[MOCK] Bad packet from {}: {}", peer, e),
        }
    }

    let mut move_timer = tokio::time::interval(Duration::from_millis(args.interval_ms.max(10)));
    let mut ping_timer = tokio::time::interval(Duration::from_millis(args.ping_interval_ms.max(100)));
    ping_timer.tick().await;
    let mut step: u64 = 0;

    loop {
        tokio::select! {
            _ = move_timer.tick() => {
                let (lat, lng) = position_at(&args, step);
                step += 1;
                let payload = json!({
                    "workerId": args.worker_id,
                    "latitude": lat,
                    "longitude": lng,
                    "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                });
                let event = SocketPacket::event(&args.event, vec![payload]);
                if sink.send(text(&Packet::Message(event))).await.is_err() {
                    println!("[MOCK] Connection closed (write failed)");
                    break;
                }
                if step % 10 == 0 {
                    println!("[MOCK] Sent {} updates to {} ({:.5}, {:.5})", step, peer, lat, lng);
                }
            }

            _ = ping_timer.tick() => {
                if sink.send(text(&Packet::Ping(None))).await.is_err() {
                    break;
                }
            }

            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(raw))) => match socketio::decode(&raw) {
                        Ok(Packet::Pong(_)) => {}
                        Ok(Packet::Message(SocketPacket::Event { name, args: event_args, .. })) => {
                            println!("[MOCK] {} emitted {} {:?}", peer, name, event_args);
                        }
                        Ok(Packet::Message(SocketPacket::Disconnect { .. })) | Ok(Packet::Close) => {
                            println!("[MOCK] {} disconnected", peer);
                            break;
                        }
                        Ok(other) => println!("[MOCK] Ignoring {:?}", other),
                        Err(e) => eprintln!("[MOCK] Bad packet from {}: {}", peer, e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        println!("[MOCK] {} closed the socket", peer);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        eprintln!("[MOCK] Read error from {}: {}", peer, e);
                        break;
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    println!("[MOCK] Realtime server listening on {}", addr);
    println!("[MOCK] Worker {} emits '{}' every {}ms", args.worker_id, args.event, args.interval_ms);

    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(handle_connection(stream, peer, args.clone()));
    }
}
