//! IO modules - external system interfaces
//!
//! This module contains everything that touches the outside world:
//! - `wire` - request parsing and boundary validation
//! - `http` - hyper HTTP API (`/api/calculate`, `/health`, `/metrics`)
//! - `report` - request input and JSON report output for the CLI

pub mod http;
pub mod report;
pub mod wire;

// Re-export commonly used types
pub use http::{serve, start_server, ApiContext};
pub use report::ReportWriter;
pub use wire::{parse_request, ValidationIssue};
