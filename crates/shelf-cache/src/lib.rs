//! Concurrent key/value cache with per-entry expiration.
//!
//! This crate provides the in-process cache that fronts persistence lookups:
//! - Strongly typed: one [`TtlCache`] per value kind
//! - Absolute expiration per entry, checked lazily on read
//! - Sharded per-key locking, no global lock across get/set
//! - An item counter kept for observability only
//!
//! There is no background sweeper. An expired entry stays resident until the
//! next read of that exact key.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_cache::{CacheConfig, TtlCache};
//!
//! let cache: TtlCache<Vec<Session>> = TtlCache::new(CacheConfig::default());
//! cache.set("42", sessions);
//! let hit = cache.get("42");
//! ```

mod cache;
mod config;

pub use cache::{CacheStats, TtlCache};
pub use config::CacheConfig;
