//! Domain models - value types, geometry and typed outcomes
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - markets, campaigns, routes, pings and the report entities
//! - `geometry` - rectangle containment and segment clipping on `Geofence`
//! - `errors` - fatal reference errors and non-fatal warnings

pub mod errors;
pub mod geometry;
pub mod types;

// Re-export commonly used types at module level
pub use errors::{AggregationError, CalculationError, ReferenceError, Warning};
pub use geometry::ClipResult;
pub use types::{
    AttributionResult, CalculateOptions, CalculateRequest, CalculateResponse, Campaign,
    CampaignId, CampaignResult, Geofence, Interval, Market, MarketId, Ping, Route, RouteId,
    RouteResult, Summary,
};
