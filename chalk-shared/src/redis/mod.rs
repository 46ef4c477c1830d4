/// Redis integration
///
/// - `client`: connection handle with health check and command timeouts
/// - `code_store`: TTL storage for email verification codes

pub mod client;
pub mod code_store;

pub use client::{RedisClient, RedisClientError, RedisSettings};
pub use code_store::{CodeStore, CodeStoreError, MemoryCodeStore, RedisCodeStore, VerificationCode};
