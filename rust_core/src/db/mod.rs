//! Database access: pool construction, retry wrapper, batch upserts, and
//! the [`store::SyncStore`] destination seam.

pub mod retry;
pub mod rows;
pub mod store;
pub mod upsert;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Pool sizing, overridable from the environment.
#[derive(Debug, Clone)]
pub struct DbPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl DbPoolConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("DB_MAX_CONNECTIONS") {
            if let Ok(n) = v.parse() {
                config.max_connections = n;
            }
        }
        if let Ok(v) = std::env::var("DB_MIN_CONNECTIONS") {
            if let Ok(n) = v.parse() {
                config.min_connections = n;
            }
        }
        if let Ok(v) = std::env::var("DB_ACQUIRE_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                config.acquire_timeout = Duration::from_secs(n);
            }
        }
        config
    }
}

/// Create a Postgres pool and verify connectivity with a ping.
pub async fn create_pool(database_url: &str, config: &DbPoolConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("database ping failed")?;

    info!(
        "database pool ready (max_connections={})",
        config.max_connections
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = DbPoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
    }

    #[test]
    fn test_pool_config_env_override() {
        std::env::set_var("DB_MAX_CONNECTIONS", "25");
        let config = DbPoolConfig::from_env();
        assert_eq!(config.max_connections, 25);
        std::env::remove_var("DB_MAX_CONNECTIONS");
    }
}
