//! Realtime transport seam
//!
//! A transport opens one connection to the realtime server and exposes it
//! as a pair of channels. Dropping the `inbound` receiver or the
//! `outbound` sender tears the connection down; the transport signals a
//! lost connection by closing `inbound`.

use crate::domain::types::Role;
use crate::error::ConnectionError;
use crate::infra::config::Config;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

/// Named event received from the server
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub name: String,
    pub payload: Value,
}

/// Named event sent to the server
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub name: String,
    pub args: Vec<Value>,
}

impl OutboundEvent {
    pub fn new(name: &str, args: Vec<Value>) -> Self {
        Self { name: name.to_string(), args }
    }
}

/// One open connection
#[derive(Debug)]
pub struct Connection {
    pub inbound: mpsc::Receiver<TransportEvent>,
    pub outbound: mpsc::Sender<OutboundEvent>,
}

/// Who is connecting; drives auth and room membership
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<Role>,
}

impl Credentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            token: config.api_token().map(str::to_string),
            user_id: config.user_id().map(str::to_string),
            role: Some(config.role()),
        }
    }

    /// Events announcing this session after every (re)connect:
    /// `join` with the user id, then `joinRoom` with the role room.
    pub fn join_events(&self) -> Vec<OutboundEvent> {
        let Some(user_id) = self.user_id.as_deref() else {
            return Vec::new();
        };
        let mut events = vec![OutboundEvent::new("join", vec![Value::String(user_id.to_string())])];
        if let Some(room) = self.role.and_then(|role| role.room_for(user_id)) {
            events.push(OutboundEvent::new("joinRoom", vec![Value::String(room)]));
        }
        events
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<Connection, ConnectionError>;
}

/// Reject endpoints no transport could dial
pub fn validate_endpoint(endpoint: &str) -> Result<Url, ConnectionError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(ConnectionError::MissingEndpoint);
    }
    let url = Url::parse(trimmed).map_err(|e| ConnectionError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => {}
        other => {
            return Err(ConnectionError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme {other}"),
            })
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConnectionError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}
