//! SQLite persistence for the key-value store.
//!
//! - `repo`: pool setup, migrations and SQL-only functions over the `kv` table.
//! - `SqliteStore`: the [`KvStore`](crate::store::KvStore) implementation
//!   callers actually hold.
//!
//! External modules should import from `mep_outreach::db`; the repository API
//! is re-exported here.

pub mod repo;

pub use repo::*;

use crate::store::KvStore;
use anyhow::Result;
use async_trait::async_trait;

/// Key-value store backed by the `kv` table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply
    /// migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        kv_get(&self.pool, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        kv_set(&self.pool, key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        kv_remove(&self.pool, key).await
    }
}
