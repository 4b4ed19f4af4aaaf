//! Domain models - tracking, pricing and backend record types
//!
//! This module contains the canonical data types used throughout the system:
//! - `LocationEvent` - a worker position update from the realtime channel
//! - `PricingQuote` / `PriceBreakdown` - quote input and derived breakdown
//! - `Job`, `Transaction`, `AdminUser` - backend records
//! - `geo` - distance and ETA helpers for the tracking view

pub mod geo;
pub mod pricing;
pub mod types;

pub use pricing::{compute_breakdown, PriceBreakdown, PricingQuote};
pub use types::{LocationEvent, Role, WorkerId};
