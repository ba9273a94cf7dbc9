//! HTTP API: gates, audit wrapper, routing and request/response mapping.

pub mod app;
pub mod audit;
pub mod authz;
pub mod context;
pub mod middleware;
