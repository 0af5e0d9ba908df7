//! MySqlRegistry — `sqlx` pool-backed node registry.

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::{debug, info};

use fleetgate_core::NodeRecord;
use fleetgate_core::config::DatabaseConfig;

use crate::error::{RegistryError, RegistryResult};
use crate::schema;
use crate::{NodeRegistry, RegistryFuture};

/// Node registry over an explicitly owned MySQL pool.
///
/// Cloning shares the pool. Connections are borrowed per statement and
/// returned by the pool guard, including when the future is dropped.
#[derive(Clone)]
pub struct MySqlRegistry {
    pool: MySqlPool,
}

fn connect_options(config: &DatabaseConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
}

fn pool_options(config: &DatabaseConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(config.max_open_conns.max(1))
        // Warm idle connections, never more than the pool may hold.
        .min_connections(config.max_idle_conns.min(config.max_open_conns))
        .max_lifetime(config.max_lifetime())
        .acquire_timeout(config.acquire_timeout())
}

impl MySqlRegistry {
    /// Open the pool and verify the database is reachable.
    pub async fn connect(config: &DatabaseConfig) -> RegistryResult<Self> {
        let pool = pool_options(config)
            .connect_with(connect_options(config))
            .await
            .map_err(|e| RegistryError::Pool(e.to_string()))?;
        info!(host = %config.host, port = config.port, db = %config.name, "registry pool opened");
        Ok(Self { pool })
    }

    /// Build the pool without connecting; connections open on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = pool_options(config).connect_lazy_with(connect_options(config));
        debug!(host = %config.host, port = config.port, db = %config.name, "lazy registry pool created");
        Self { pool }
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create the `users` and `node` tables if they don't exist yet.
    pub async fn ensure_schema(&self) -> RegistryResult<()> {
        sqlx::query(schema::CREATE_USERS).execute(&self.pool).await?;
        sqlx::query(schema::CREATE_NODE).execute(&self.pool).await?;
        info!("registry schema ensured");
        Ok(())
    }

    /// Close every pooled connection. Pending acquisitions fail afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("registry pool closed");
    }

    async fn user_id(&self, username: &str) -> RegistryResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(schema::SELECT_USER_ID)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        id.ok_or_else(|| RegistryError::UserNotFound(username.to_string()))
    }

    async fn password_hash(&self, username: &str) -> RegistryResult<Option<String>> {
        let hash = sqlx::query_scalar::<_, String>(schema::SELECT_PASSWORD_HASH)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn insert(&self, record: &NodeRecord) -> RegistryResult<()> {
        sqlx::query(schema::INSERT_NODE)
            .bind(&record.name)
            .bind(&record.ip)
            .bind(record.node_type as i32)
            .bind(record.status as i32)
            .bind(record.user_id)
            .bind(record.num_cpu)
            .bind(record.size_mem)
            .bind(record.num_gpu)
            .bind(&record.gpu_type)
            .execute(&self.pool)
            .await?;
        debug!(node = %record.name, user_id = record.user_id, "node row inserted");
        Ok(())
    }

    async fn delete(&self, name: &str) -> RegistryResult<u64> {
        let result = sqlx::query(schema::DELETE_NODE_BY_NAME)
            .bind(name)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected();
        debug!(node = %name, deleted, "node row delete executed");
        Ok(deleted)
    }
}

impl NodeRegistry for MySqlRegistry {
    fn find_user_id<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, i64> {
        Box::pin(self.user_id(username))
    }

    fn find_password_hash<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, Option<String>> {
        Box::pin(self.password_hash(username))
    }

    fn insert_node<'a>(&'a self, record: &'a NodeRecord) -> RegistryFuture<'a, ()> {
        Box::pin(self.insert(record))
    }

    fn delete_node_by_name<'a>(&'a self, name: &'a str) -> RegistryFuture<'a, u64> {
        Box::pin(self.delete(name))
    }
}
