//! # Chalk API Server Library
//!
//! HTTP surface of the Chalk learning platform.
//!
//! ## Modules
//!
//! - `app`: Application state, router and bearer authentication
//! - `config`: Layered configuration (file, then `CHALK__*` environment)
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers
//! - `telemetry`: Tracing subscriber setup
//! - `shutdown`: Signal handling
//! - `purge`: Background removal of expired sessions

pub mod app;
pub mod config;
pub mod error;
pub mod purge;
pub mod routes;
pub mod shutdown;
pub mod telemetry;
