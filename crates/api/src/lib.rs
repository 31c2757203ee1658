//! HTTP API: server wiring, routing, authentication and authorization middleware.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
