//! enact-server
//!
//! HTTP ingress for the Enact dispatcher: accepts tasks, hands them to the
//! worker pool, and serves recorded terminal statuses.

pub mod app;
pub mod config;
pub mod errors;
pub mod observability;
pub mod routes;
