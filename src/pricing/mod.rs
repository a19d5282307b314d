//! Rental pricing engine.
//!
//! Computes billable days, overage hours and the late-return penalty for a
//! motorcycle rental. The calculation itself is pure; `routes` exposes it as
//! a JSON quote endpoint for the booking form.

pub mod calculators;
pub mod models;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

// Re-export commonly used items
pub use calculators::calculate;
pub use models::{parse_clock_time, PriceBreakdown, PricingPolicy, RentalRequest};
pub use routes::router;
pub use services::PricingError;
