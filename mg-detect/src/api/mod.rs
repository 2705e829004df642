//! HTTP API handlers for mg-detect

pub mod analyze;
pub mod health;

pub use analyze::analysis_routes;
pub use health::health_routes;
