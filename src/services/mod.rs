//! Services - the attribution pipeline
//!
//! Pure, synchronous functions of their input; nothing here logs or keeps
//! state between calls:
//! - `attribution` - per-route time inside a geofence, entry/exit counts
//! - `impressions` - per-route and per-campaign impression aggregation
//! - `validator` - reference integrity and data-sufficiency warnings
//! - `calculator` - full request pipeline and report assembly

pub mod attribution;
pub mod calculator;
pub mod impressions;
pub mod validator;

// Re-export commonly used types
pub use attribution::attribute;
pub use calculator::{calculate, Calculation};
pub use impressions::aggregate;
pub use validator::validate_references;
