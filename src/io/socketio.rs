//! Engine.IO v4 / Socket.IO v5 text packet codec
//!
//! Engine.IO packet: `<type>[data]`
//! - 0 open (JSON handshake), 1 close, 2 ping, 3 pong, 4 message, 6 noop
//!
//! Socket.IO packet (inside an Engine.IO message):
//! `<type>[<namespace>,][<ack id>][JSON payload]`
//! - 0 connect, 1 disconnect, 2 event, 3 ack, 4 connect_error
//!
//! Binary packets (5, 6) are not supported by the realtime backend and
//! decode as errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("unsupported packet type {0:?}")]
    Unsupported(char),
    #[error("malformed packet: {0}")]
    Malformed(String),
}

/// Open packet payload sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(SocketPacket),
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String, data: Option<Value> },
    Disconnect { namespace: String },
    Event { namespace: String, ack_id: Option<u64>, name: String, args: Vec<Value> },
    Ack { namespace: String, ack_id: u64, args: Vec<Value> },
    ConnectError { namespace: String, data: Option<Value> },
}

impl SocketPacket {
    /// Event on the default namespace
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            name: name.to_string(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }
}

/// Decode one Engine.IO text frame
pub fn decode(text: &str) -> Result<Packet, CodecError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(Packet::Open)
            .map_err(|e| CodecError::Malformed(format!("handshake: {e}"))),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping(non_empty(rest))),
        '3' => Ok(Packet::Pong(non_empty(rest))),
        '4' => decode_socket(rest).map(Packet::Message),
        '6' => Ok(Packet::Noop),
        '5' => Err(CodecError::Unsupported(kind)),
        other => Err(CodecError::UnknownType(other)),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn decode_socket(text: &str) -> Result<SocketPacket, CodecError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let mut rest = chars.as_str();

    // Optional namespace, terminated by ','
    let namespace = if rest.starts_with('/') {
        let (ns, tail) = match rest.find(',') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        rest = tail;
        ns.to_string()
    } else {
        DEFAULT_NAMESPACE.to_string()
    };

    // Optional ack id
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let ack_id = if digits > 0 {
        let id = rest[..digits]
            .parse::<u64>()
            .map_err(|e| CodecError::Malformed(format!("ack id: {e}")))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let payload = if rest.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(rest)
                .map_err(|e| CodecError::Malformed(format!("payload: {e}")))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, data: payload }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let Some(Value::Array(mut items)) = payload else {
                return Err(CodecError::Malformed("event payload is not an array".to_string()));
            };
            if items.is_empty() {
                return Err(CodecError::Malformed("event without name".to_string()));
            }
            let Value::String(name) = items.remove(0) else {
                return Err(CodecError::Malformed("event name is not a string".to_string()));
            };
            Ok(SocketPacket::Event { namespace, ack_id, name, args: items })
        }
        '3' => {
            let ack_id =
                ack_id.ok_or_else(|| CodecError::Malformed("ack without id".to_string()))?;
            let args = match payload {
                Some(Value::Array(items)) => items,
                Some(_) => return Err(CodecError::Malformed("ack payload is not an array".into())),
                None => Vec::new(),
            };
            Ok(SocketPacket::Ack { namespace, ack_id, args })
        }
        '4' => Ok(SocketPacket::ConnectError { namespace, data: payload }),
        '5' | '6' => Err(CodecError::Unsupported(kind)),
        other => Err(CodecError::UnknownType(other)),
    }
}

/// Encode one packet as an Engine.IO text frame
pub fn encode(packet: &Packet) -> String {
    match packet {
        Packet::Open(handshake) => {
            format!("0{}", serde_json::to_string(handshake).unwrap_or_else(|_| "{}".into()))
        }
        Packet::Close => "1".to_string(),
        Packet::Ping(probe) => format!("2{}", probe.as_deref().unwrap_or("")),
        Packet::Pong(probe) => format!("3{}", probe.as_deref().unwrap_or("")),
        Packet::Message(socket) => format!("4{}", encode_socket(socket)),
        Packet::Noop => "6".to_string(),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE || namespace.is_empty() {
        String::new()
    } else {
        format!("{namespace},")
    }
}

fn encode_socket(packet: &SocketPacket) -> String {
    match packet {
        SocketPacket::Connect { namespace, data } => {
            let body = data.as_ref().map(Value::to_string).unwrap_or_default();
            format!("0{}{}", namespace_prefix(namespace), body)
        }
        SocketPacket::Disconnect { namespace } => format!("1{}", namespace_prefix(namespace)),
        SocketPacket::Event { namespace, ack_id, name, args } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            let ack = ack_id.map(|id| id.to_string()).unwrap_or_default();
            format!("2{}{}{}", namespace_prefix(namespace), ack, Value::Array(items))
        }
        SocketPacket::Ack { namespace, ack_id, args } => {
            format!("3{}{}{}", namespace_prefix(namespace), ack_id, Value::Array(args.clone()))
        }
        SocketPacket::ConnectError { namespace, data } => {
            let body = data.as_ref().map(Value::to_string).unwrap_or_default();
            format!("4{}{}", namespace_prefix(namespace), body)
        }
    }
}
