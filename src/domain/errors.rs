//! Typed outcomes of a calculation
//!
//! Fatal reference-integrity failures are errors and abort the whole
//! calculation. Data-sufficiency findings are [`Warning`]s, collected and
//! returned next to a complete result.

use crate::domain::types::{CampaignId, MarketId, RouteId};
use thiserror::Error;

/// Broken foreign key in the input set; the first offender is reported
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Campaign {campaign_id} references non-existent market {market_id}")]
    UnknownMarket { campaign_id: CampaignId, market_id: MarketId },

    #[error("Route {route_id} references non-existent campaign {campaign_id}")]
    UnknownCampaign { route_id: RouteId, campaign_id: CampaignId },
}

/// Raised by the aggregator when a campaign's market cannot be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("Market {market_id} not found for campaign {campaign_id}")]
    MarketNotFound { market_id: MarketId, campaign_id: CampaignId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculationError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

impl CalculationError {
    /// Short machine-friendly label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            CalculationError::Reference(ReferenceError::UnknownMarket { .. }) => "unknown_market",
            CalculationError::Reference(ReferenceError::UnknownCampaign { .. }) => {
                "unknown_campaign"
            }
            CalculationError::Aggregation(AggregationError::MarketNotFound { .. }) => {
                "market_not_found"
            }
        }
    }
}

/// Non-fatal finding about a route; never changes computed results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    InsufficientPings { route_id: RouteId, ping_count: usize },
    UnsortedTimestamps { route_id: RouteId },
}

impl Warning {
    pub fn route_id(&self) -> &RouteId {
        match self {
            Warning::InsufficientPings { route_id, .. } => route_id,
            Warning::UnsortedTimestamps { route_id } => route_id,
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::InsufficientPings { route_id, .. } => write!(
                f,
                "Route {route_id} has fewer than 2 pings - no time intervals to calculate"
            ),
            Warning::UnsortedTimestamps { route_id } => write!(
                f,
                "Route {route_id} has out-of-order timestamps - they will be sorted automatically"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_error_display() {
        let err = ReferenceError::UnknownMarket {
            campaign_id: CampaignId::from("camp_001"),
            market_id: MarketId::from("NYC"),
        };
        assert_eq!(err.to_string(), "Campaign camp_001 references non-existent market NYC");

        let err = ReferenceError::UnknownCampaign {
            route_id: RouteId::from("route_001"),
            campaign_id: CampaignId::from("invalid_campaign"),
        };
        assert_eq!(
            err.to_string(),
            "Route route_001 references non-existent campaign invalid_campaign"
        );
    }

    #[test]
    fn test_calculation_error_is_transparent() {
        let err: CalculationError = AggregationError::MarketNotFound {
            market_id: MarketId::from("SF"),
            campaign_id: CampaignId::from("c9"),
        }
        .into();
        assert_eq!(err.to_string(), "Market SF not found for campaign c9");
        assert_eq!(err.kind(), "market_not_found");
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::InsufficientPings { route_id: RouteId::from("route_001"), ping_count: 1 };
        assert_eq!(
            w.to_string(),
            "Route route_001 has fewer than 2 pings - no time intervals to calculate"
        );
        assert_eq!(w.route_id().as_str(), "route_001");

        let w = Warning::UnsortedTimestamps { route_id: RouteId::from("r2") };
        assert!(w.to_string().contains("out-of-order timestamps"));
    }
}
