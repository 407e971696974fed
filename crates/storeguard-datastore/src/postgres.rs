//! PostgreSQL pools backed by `deadpool-postgres`.

use crate::config::Endpoint;
use crate::error::DatastoreError;
use crate::pool::{ConnectionPool, Connector};
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

/// Opens [`PgPool`]s without TLS.
///
/// Pools connect lazily, so `open` only fails on bad settings; the
/// initializer's ping is the first real round-trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl Connector for PgConnector {
    type Pool = PgPool;

    async fn open(&self, endpoint: &Endpoint) -> Result<PgPool, DatastoreError> {
        let pool = pool_config(endpoint)
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatastoreError::Config(e.to_string()))?;

        Ok(PgPool {
            pool,
            url: endpoint.redacted_url(),
        })
    }
}

/// Connecting, checking out and recycling a connection each give up well
/// inside the 5s request budget, so an unreachable server surfaces as a
/// retryable error instead of a hung call.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(2);
const RECYCLE_TIMEOUT: Duration = Duration::from_secs(1);
/// Server-side cap on a single statement.
const STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

fn pool_config(endpoint: &Endpoint) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(endpoint.host.clone());
    cfg.port = Some(endpoint.port);
    cfg.user = Some(endpoint.user.clone());
    cfg.password = endpoint.password.clone();
    cfg.dbname = Some(endpoint.dbname.clone());
    cfg.connect_timeout = Some(CONNECT_TIMEOUT);
    cfg.options = Some(format!(
        "-c statement_timeout={}",
        STATEMENT_TIMEOUT.as_millis()
    ));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let mut pool = PoolConfig::new(endpoint.max_connections);
    pool.timeouts = Timeouts {
        wait: Some(CHECKOUT_TIMEOUT),
        create: Some(CONNECT_TIMEOUT),
        recycle: Some(RECYCLE_TIMEOUT),
    };
    cfg.pool = Some(pool);
    cfg
}

/// A pool of PostgreSQL connections for one endpoint.
pub struct PgPool {
    pool: Pool,
    url: String,
}

impl PgPool {
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, DatastoreError> {
        let client = self.client().await?;
        client.query(sql, params).await.map_err(query_error)
    }

    pub async fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, DatastoreError> {
        let client = self.client().await?;
        client.query_one(sql, params).await.map_err(query_error)
    }

    /// Returns the number of rows affected.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, DatastoreError> {
        let client = self.client().await?;
        client.execute(sql, params).await.map_err(query_error)
    }

    /// Connection URL without the password.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `(size, available)` connections.
    pub fn stats(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.size, status.available)
    }

    async fn client(&self) -> Result<deadpool_postgres::Client, DatastoreError> {
        self.pool.get().await.map_err(pool_error)
    }
}

impl ConnectionPool for PgPool {
    async fn ping(&self) -> Result<(), DatastoreError> {
        let client = self.client().await?;
        client.simple_query("SELECT 1").await.map_err(query_error)?;
        Ok(())
    }

    fn close(&self) {
        self.pool.close();
    }
}

impl std::fmt::Debug for PgPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPool").field("url", &self.url).finish()
    }
}

fn pool_error(error: PoolError) -> DatastoreError {
    match error {
        PoolError::Backend(e) => query_error(e),
        other => DatastoreError::Pool(other.to_string()),
    }
}

// Errors the server reported are query errors; everything else means the
// connection is unusable.
fn query_error(error: tokio_postgres::Error) -> DatastoreError {
    if error.as_db_error().is_some() {
        DatastoreError::Query(error.to_string())
    } else {
        DatastoreError::Connection(error.to_string())
    }
}
