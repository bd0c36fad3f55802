//! HTTP boundary: router, auth middleware, request/response mapping.

pub mod app;
pub mod config;
pub mod middleware;
