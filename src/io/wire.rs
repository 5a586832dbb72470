//! Request parsing and boundary validation
//!
//! Shape errors come from serde; value checks that serde cannot express
//! (positive rates, finite coordinates) are collected here so the
//! calculation core only ever sees well-typed, finite input.

use crate::domain::types::{CalculateRequest, Geofence};
use serde::Serialize;

/// One problem found in an incoming payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Parse and validate a calculation request body
pub fn parse_request(body: &[u8]) -> Result<CalculateRequest, Vec<ValidationIssue>> {
    let request: CalculateRequest = serde_json::from_slice(body).map_err(|e| {
        vec![ValidationIssue::new(
            format!("line {} column {}", e.line(), e.column()),
            e.to_string(),
        )]
    })?;

    let issues = validate_values(&request);
    if issues.is_empty() {
        Ok(request)
    } else {
        Err(issues)
    }
}

/// Value-level checks on an already deserialized request
pub fn validate_values(request: &CalculateRequest) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (i, market) in request.markets.iter().enumerate() {
        let ipm = market.impressions_per_minute;
        if !ipm.is_finite() || ipm <= 0.0 {
            issues.push(ValidationIssue::new(
                format!("markets[{i}].impressionsPerMinute"),
                "must be a positive number",
            ));
        }
    }

    for (i, campaign) in request.campaigns.iter().enumerate() {
        check_geofence(&campaign.geofence, &format!("campaigns[{i}].geofence"), &mut issues);
    }

    for (i, route) in request.routes.iter().enumerate() {
        for (j, ping) in route.pings.iter().enumerate() {
            if !ping.lon.is_finite() {
                issues.push(ValidationIssue::new(
                    format!("routes[{i}].pings[{j}].lon"),
                    "must be a finite number",
                ));
            }
            if !ping.lat.is_finite() {
                issues.push(ValidationIssue::new(
                    format!("routes[{i}].pings[{j}].lat"),
                    "must be a finite number",
                ));
            }
        }
    }

    issues
}

fn check_geofence(geofence: &Geofence, path: &str, issues: &mut Vec<ValidationIssue>) {
    let bounds = [
        ("minLon", geofence.min_lon),
        ("maxLon", geofence.max_lon),
        ("minLat", geofence.min_lat),
        ("maxLat", geofence.max_lat),
    ];
    for (name, value) in bounds {
        if !value.is_finite() {
            issues.push(ValidationIssue::new(format!("{path}.{name}"), "must be a finite number"));
        }
    }
}
