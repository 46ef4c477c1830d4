//! # Chalk Shared Library
//!
//! Domain logic for the Chalk learning platform, used by the API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool, migrations and the sibling ordering engine
//! - `models`: users, accounts, sessions, files and the course hierarchy
//! - `auth`: password hashing, verification codes and session lifecycle
//! - `redis`: Redis connection and the verification code store
//! - `mail`: outbound mail seam
//! - `storage`: object storage seam for uploaded files
//! - `error`: store and user error taxonomy

pub mod auth;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod redis;
pub mod storage;

/// Current version of the Chalk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
