//! HTTP API handlers for gazedeck-en

pub mod enhance;
pub mod health;

pub use enhance::enhance_routes;
pub use health::health_routes;
