//! Shared value types for impression attribution
//!
//! Every entity here is built once per calculation and dropped with the
//! response. Field names serialize in camelCase to match the API contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Newtype wrapper for market identifiers
    MarketId
);
string_id!(
    /// Newtype wrapper for campaign identifiers
    CampaignId
);
string_id!(
    /// Newtype wrapper for route identifiers
    RouteId
);

/// Axis-aligned rectangle in planar lon/lat coordinates.
///
/// `min <= max` on both axes is expected but not enforced; an inverted
/// rectangle simply contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Geofence {
    #[inline]
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self { min_lon, max_lon, min_lat, max_lat }
    }
}

/// One timestamped location sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    #[serde(deserialize_with = "deserialize_utc_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub lon: f64,
    pub lat: f64,
}

impl Ping {
    #[inline]
    pub fn new(timestamp: DateTime<Utc>, lon: f64, lat: f64) -> Self {
        Self { timestamp, lon, lat }
    }
}

/// RFC 3339 timestamps with a `Z` designator only; numeric offsets are rejected
fn deserialize_utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if !raw.ends_with('Z') {
        return Err(serde::de::Error::custom(format!(
            "timestamp {raw:?} must be an ISO-8601 UTC string ending in Z"
        )));
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}

/// A vehicle route: an unordered bag of pings belonging to one campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub route_id: RouteId,
    pub campaign_id: CampaignId,
    pub pings: Vec<Ping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub market_id: MarketId,
    pub impressions_per_minute: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub campaign_id: CampaignId,
    pub market_id: MarketId,
    pub geofence: Geofence,
}

/// Time span between two consecutive pings, annotated with the share of
/// the straight segment between them that lies inside the geofence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub seconds: f64,
    pub inside_fraction: f64,
}

/// Output of time attribution for one route against one geofence
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributionResult {
    pub intervals: Vec<Interval>,
    pub total_seconds_inside: f64,
    pub entries: u32,
    pub exits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub route_id: RouteId,
    pub seconds_inside: f64,
    pub impressions: u64,
    pub entries: u32,
    pub exits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervals: Option<Vec<Interval>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResult {
    pub campaign_id: CampaignId,
    pub market_id: MarketId,
    pub impressions_per_minute: f64,
    pub total_seconds_inside: f64,
    pub total_impressions: u64,
    pub routes: Vec<RouteResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateOptions {
    #[serde(default)]
    pub return_intervals: Option<bool>,
}

/// Full calculation input as accepted at the API boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub markets: Vec<Market>,
    pub campaigns: Vec<Campaign>,
    pub routes: Vec<Route>,
    #[serde(default)]
    pub options: Option<CalculateOptions>,
}

impl CalculateRequest {
    /// Requested interval output, or `None` when the caller left it unset
    pub fn return_intervals(&self) -> Option<bool> {
        self.options.and_then(|o| o.return_intervals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_impressions: u64,
    pub total_seconds_inside: f64,
    pub route_count: usize,
    pub campaign_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
    pub summary: Summary,
    pub campaigns: Vec<CampaignResult>,
    pub assumptions: Vec<String>,
    pub limitations: Vec<String>,
}
