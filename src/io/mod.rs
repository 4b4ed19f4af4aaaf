//! IO modules - external system interfaces
//!
//! - `socketio` - Engine.IO / Socket.IO text packet codec
//! - `transport` - Realtime transport trait and connection types
//! - `websocket` - Socket.IO over WebSocket transport
//! - `loopback` - In-process transport for tests and simulation
//! - `api` - Backend REST client
//! - `map` - Map provider seam and placeholder surface

pub mod api;
pub mod loopback;
pub mod map;
pub mod socketio;
pub mod transport;
pub mod websocket;

// Re-export commonly used types
pub use api::ApiClient;
pub use loopback::{LoopbackPeer, LoopbackPeers, LoopbackTransport};
pub use map::{init_map, MapOptions, MapSurface, PlaceholderMap};
pub use transport::{Connection, Credentials, OutboundEvent, Transport, TransportEvent};
pub use websocket::WsTransport;
