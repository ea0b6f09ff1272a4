//! Shared core for the sports data sync service.
//!
//! Fetch, transform, resolve and upsert: rate-limited vendor clients pull
//! raw JSON, transforms flatten it into destination-shaped rows, ID caches
//! resolve cross-table references, and the batch upserter writes idempotent
//! `ON CONFLICT` statements to Postgres. The pipeline module drives the
//! stages best-effort per league.

pub mod cache;
pub mod clients;
pub mod config;
pub mod db;
pub mod http;
pub mod matching;
pub mod paginate;
pub mod pipeline;
pub mod transform;
pub mod types;

pub use cache::IdCache;
pub use clients::SportsProvider;
pub use config::{Provider, SyncConfig};
pub use db::store::{PgStore, SyncStore};
pub use db::{create_pool, DbPoolConfig};
pub use http::{BackoffPolicy, FetchError, RateLimitedClient};
pub use pipeline::{SyncOptions, SyncPipeline, SyncReport};
pub use types::{League, Transformed};
