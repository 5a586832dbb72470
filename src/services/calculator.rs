//! Full calculation pipeline: validate, aggregate, assemble the report

use crate::domain::errors::{CalculationError, Warning};
use crate::domain::types::{CalculateRequest, CalculateResponse, Summary};
use crate::services::impressions::aggregate;
use crate::services::validator::validate_references;

pub const ASSUMPTIONS: [&str; 4] = [
    "Linear movement between consecutive pings",
    "Planar approximation for lat/lon coordinates (suitable for city-scale distances)",
    "Time attribution based on fraction of line segment inside geofence",
    "Impressions rounded to nearest integer",
];

pub const LIMITATIONS: [&str; 4] = [
    "Only supports rectangular geofences (axis-aligned)",
    "Does not account for GPS accuracy or smoothing",
    "Large gaps between pings may reduce accuracy",
    "No consideration for vehicle speed or direction changes",
];

/// Completed calculation plus the warnings that were folded into it
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub response: CalculateResponse,
    pub warnings: Vec<Warning>,
}

/// Run the whole pipeline on one request.
///
/// `default_return_intervals` applies when the request leaves
/// `options.returnIntervals` unset. No partial output is produced on error.
pub fn calculate(
    request: &CalculateRequest,
    default_return_intervals: bool,
) -> Result<Calculation, CalculationError> {
    let warnings = validate_references(&request.markets, &request.campaigns, &request.routes)?;

    let return_intervals = request.return_intervals().unwrap_or(default_return_intervals);
    let campaigns =
        aggregate(&request.markets, &request.campaigns, &request.routes, return_intervals)?;

    let summary = Summary {
        total_impressions: campaigns.iter().map(|c| c.total_impressions).sum(),
        total_seconds_inside: campaigns.iter().map(|c| c.total_seconds_inside).sum(),
        route_count: request.routes.len(),
        campaign_count: request.campaigns.len(),
    };

    let limitations = LIMITATIONS
        .iter()
        .map(|s| s.to_string())
        .chain(warnings.iter().map(Warning::to_string))
        .collect();

    let response = CalculateResponse {
        summary,
        campaigns,
        assumptions: ASSUMPTIONS.iter().map(|s| s.to_string()).collect(),
        limitations,
    };

    Ok(Calculation { response, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ReferenceError;
    use crate::domain::types::{
        CalculateOptions, Campaign, CampaignId, Geofence, Market, MarketId, Ping, Route, RouteId,
    };
    use chrono::{DateTime, Duration, Utc};

    fn t0() -> DateTime<Utc> {
        "2025-01-15T10:00:00Z".parse().unwrap()
    }

    fn request(routes: Vec<Route>) -> CalculateRequest {
        CalculateRequest {
            markets: vec![Market {
                market_id: MarketId::from("LA"),
                impressions_per_minute: 1200.0,
            }],
            campaigns: vec![Campaign {
                campaign_id: CampaignId::from("camp_001"),
                market_id: MarketId::from("LA"),
                geofence: Geofence::new(-118.5, -118.2, 34.0, 34.2),
            }],
            routes,
            options: None,
        }
    }

    fn route(id: &str, pings: Vec<Ping>) -> Route {
        Route { route_id: RouteId::from(id), campaign_id: CampaignId::from("camp_001"), pings }
    }

    #[test]
    fn test_summary_and_static_text() {
        let pings = vec![
            Ping::new(t0(), -118.4, 34.1),
            Ping::new(t0() + Duration::seconds(120), -118.3, 34.15),
        ];
        let calc = calculate(&request(vec![route("route_001", pings)]), false).unwrap();
        let response = calc.response;

        assert_eq!(response.summary.total_impressions, 2400);
        assert_eq!(response.summary.total_seconds_inside, 120.0);
        assert_eq!(response.summary.route_count, 1);
        assert_eq!(response.summary.campaign_count, 1);
        assert_eq!(response.assumptions.len(), 4);
        assert_eq!(response.limitations, LIMITATIONS.map(String::from).to_vec());
        assert!(calc.warnings.is_empty());
    }

    #[test]
    fn test_warnings_appended_to_limitations() {
        let single = vec![Ping::new(t0(), -118.4, 34.1)];
        let calc = calculate(&request(vec![route("route_001", single)]), false).unwrap();

        assert_eq!(calc.warnings.len(), 1);
        assert_eq!(calc.response.limitations.len(), LIMITATIONS.len() + 1);
        assert_eq!(
            calc.response.limitations.last().unwrap(),
            "Route route_001 has fewer than 2 pings - no time intervals to calculate"
        );
        let route_result = &calc.response.campaigns[0].routes[0];
        assert_eq!(route_result.seconds_inside, 0.0);
        assert_eq!(route_result.impressions, 0);
    }

    #[test]
    fn test_unsorted_route_matches_sorted_totals() {
        let a = Ping::new(t0(), -118.7, 34.1);
        let b = Ping::new(t0() + Duration::seconds(60), -118.4, 34.1);
        let c = Ping::new(t0() + Duration::seconds(120), -118.1, 34.1);

        let sorted = calculate(&request(vec![route("r", vec![a, b, c])]), false).unwrap();
        let shuffled = calculate(&request(vec![route("r", vec![c, a, b])]), false).unwrap();

        assert_eq!(sorted.response.campaigns, shuffled.response.campaigns);
        assert!(sorted.warnings.is_empty());
        assert!(matches!(shuffled.warnings[..], [Warning::UnsortedTimestamps { .. }]));
    }

    #[test]
    fn test_reference_error_aborts() {
        let mut req = request(vec![]);
        req.campaigns[0].market_id = MarketId::from("NYC");

        let err = calculate(&req, false).unwrap_err();
        assert_eq!(
            err,
            CalculationError::Reference(ReferenceError::UnknownMarket {
                campaign_id: CampaignId::from("camp_001"),
                market_id: MarketId::from("NYC"),
            })
        );
        assert_eq!(err.kind(), "unknown_market");
    }

    #[test]
    fn test_request_option_overrides_default() {
        let pings = vec![
            Ping::new(t0(), -118.4, 34.1),
            Ping::new(t0() + Duration::seconds(60), -118.3, 34.1),
        ];
        let mut req = request(vec![route("r", pings)]);

        let calc = calculate(&req, true).unwrap();
        assert!(calc.response.campaigns[0].routes[0].intervals.is_some());

        req.options = Some(CalculateOptions { return_intervals: Some(false) });
        let calc = calculate(&req, true).unwrap();
        assert!(calc.response.campaigns[0].routes[0].intervals.is_none());
    }

    #[test]
    fn test_identical_input_reproduces_output() {
        let pings = vec![
            Ping::new(t0(), -118.6, 34.05),
            Ping::new(t0() + Duration::seconds(45), -118.35, 34.15),
            Ping::new(t0() + Duration::seconds(100), -118.0, 34.3),
        ];
        let req = request(vec![route("r", pings)]);
        assert_eq!(calculate(&req, true).unwrap(), calculate(&req, true).unwrap());
    }
}
