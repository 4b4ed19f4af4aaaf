//! Services - realtime subscriptions and view state
//!
//! - `registry` - Per-event handler registry with safe removal
//! - `channel` - Shared realtime location channel and its connection task
//! - `tracking` - Live tracking view (marker, distance, ETA)
//! - `sidebar` - Role-specific navigation

pub mod channel;
pub mod registry;
pub mod sidebar;
pub mod tracking;

// Re-export commonly used types
pub use channel::{Channel, ChannelHandle, ConnectionStatus, Connector};
pub use registry::HandlerRegistry;
pub use sidebar::{NavItem, Sidebar};
pub use tracking::TrackingView;
