//! # nexo-store
//!
//! PostgreSQL persistence layer for nexograph.
//!
//! This crate provides:
//! - Connection pool management
//! - The job store (find-or-create dedup, atomic claims, terminal updates)
//! - A read-only view over the typed node/edge store
//! - In-memory implementations of both traits for tests and embedded use

pub mod entities;
pub mod jobs;
pub mod memory;
pub mod pool;

// Re-export core types
pub use nexo_core::*;

pub use entities::PgEntityStore;
pub use jobs::PgJobStore;
pub use memory::{MemoryEntityStore, MemoryJobStore};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

/// Combined database context: one pool, both stores.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Job record store.
    pub jobs: PgJobStore,
    /// Read-only typed entity store.
    pub entities: PgEntityStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            jobs: PgJobStore::new(pool.clone()),
            entities: PgEntityStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
