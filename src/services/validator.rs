//! Reference-integrity and data-sufficiency checks
//!
//! Runs before aggregation. Foreign-key violations fail fast with the first
//! offender; sufficiency findings are collected across all routes.

use crate::domain::errors::{ReferenceError, Warning};
use crate::domain::types::{Campaign, CampaignId, Market, MarketId, Route};
use rustc_hash::FxHashSet;

/// Minimum pings needed to form one time interval
pub const MIN_PINGS_PER_ROUTE: usize = 2;

/// Validate campaign->market and route->campaign references.
///
/// All campaigns are checked before any route. Warnings never alter
/// computed results.
pub fn validate_references(
    markets: &[Market],
    campaigns: &[Campaign],
    routes: &[Route],
) -> Result<Vec<Warning>, ReferenceError> {
    let market_ids: FxHashSet<&MarketId> = markets.iter().map(|m| &m.market_id).collect();
    let campaign_ids: FxHashSet<&CampaignId> = campaigns.iter().map(|c| &c.campaign_id).collect();

    if let Some(campaign) = campaigns.iter().find(|c| !market_ids.contains(&c.market_id)) {
        return Err(ReferenceError::UnknownMarket {
            campaign_id: campaign.campaign_id.clone(),
            market_id: campaign.market_id.clone(),
        });
    }

    if let Some(route) = routes.iter().find(|r| !campaign_ids.contains(&r.campaign_id)) {
        return Err(ReferenceError::UnknownCampaign {
            route_id: route.route_id.clone(),
            campaign_id: route.campaign_id.clone(),
        });
    }

    let mut warnings = Vec::new();
    for route in routes {
        if route.pings.len() < MIN_PINGS_PER_ROUTE {
            warnings.push(Warning::InsufficientPings {
                route_id: route.route_id.clone(),
                ping_count: route.pings.len(),
            });
        }

        if !is_time_ordered(route) {
            warnings.push(Warning::UnsortedTimestamps { route_id: route.route_id.clone() });
        }
    }

    Ok(warnings)
}

/// True when pings are already non-decreasing by timestamp
fn is_time_ordered(route: &Route) -> bool {
    route.pings.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}
