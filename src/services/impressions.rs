//! Impression aggregation per route and per campaign

use crate::domain::errors::AggregationError;
use crate::domain::types::{Campaign, CampaignResult, Market, MarketId, Route, RouteResult};
use crate::services::attribution::attribute;
use rustc_hash::FxHashMap;

/// Convert attributed seconds into a whole impression count.
///
/// `f64::round` rounds half away from zero, which equals half-up for the
/// non-negative inputs seen here.
#[inline]
pub fn impressions_for(seconds_inside: f64, impressions_per_minute: f64) -> u64 {
    (seconds_inside * (impressions_per_minute / 60.0)).round() as u64
}

/// Compute per-route and per-campaign impressions.
///
/// Campaign order follows `campaigns`; each campaign's routes follow input
/// order. Campaign impression totals sum the already-rounded route counts,
/// while `total_seconds_inside` sums the unrounded route seconds.
pub fn aggregate(
    markets: &[Market],
    campaigns: &[Campaign],
    routes: &[Route],
    return_intervals: bool,
) -> Result<Vec<CampaignResult>, AggregationError> {
    let market_by_id: FxHashMap<&MarketId, &Market> =
        markets.iter().map(|m| (&m.market_id, m)).collect();

    campaigns
        .iter()
        .map(|campaign| {
            let market = market_by_id.get(&campaign.market_id).ok_or_else(|| {
                AggregationError::MarketNotFound {
                    market_id: campaign.market_id.clone(),
                    campaign_id: campaign.campaign_id.clone(),
                }
            })?;

            Ok(aggregate_campaign(campaign, market, routes, return_intervals))
        })
        .collect()
}

fn aggregate_campaign(
    campaign: &Campaign,
    market: &Market,
    routes: &[Route],
    return_intervals: bool,
) -> CampaignResult {
    let mut total_seconds_inside = 0.0;
    let mut total_impressions = 0u64;

    let route_results: Vec<RouteResult> = routes
        .iter()
        .filter(|r| r.campaign_id == campaign.campaign_id)
        .map(|route| {
            let attribution = attribute(&route.pings, &campaign.geofence);
            let impressions =
                impressions_for(attribution.total_seconds_inside, market.impressions_per_minute);

            total_seconds_inside += attribution.total_seconds_inside;
            total_impressions += impressions;

            RouteResult {
                route_id: route.route_id.clone(),
                seconds_inside: attribution.total_seconds_inside,
                impressions,
                entries: attribution.entries,
                exits: attribution.exits,
                intervals: return_intervals.then_some(attribution.intervals),
            }
        })
        .collect();

    CampaignResult {
        campaign_id: campaign.campaign_id.clone(),
        market_id: campaign.market_id.clone(),
        impressions_per_minute: market.impressions_per_minute,
        total_seconds_inside,
        total_impressions,
        routes: route_results,
    }
}
