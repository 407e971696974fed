use crate::config::{DatabaseConfig, Endpoint};
use crate::error::{ConnectionInitError, DatastoreError};
use crate::pool::{ConnectionPool, Connector};
use crate::router::{ConnectionRouter, ReplicaStatus};
use std::sync::Arc;
use storeguard_retry::{RetryConfig, RetryPolicy};

/// Opens the primary and replica pools at startup.
///
/// Each endpoint is opened and pinged under the startup retry profile
/// (roughly two minutes), which is independent of the per-request budget.
/// The primary is mandatory. A replica that never answers is logged and
/// reads fall back to the primary for the life of the process.
pub struct ConnectionInitializer<C> {
    connector: C,
    retry: RetryPolicy<DatastoreError>,
}

impl<C: Connector> ConnectionInitializer<C> {
    pub fn new(connector: C) -> Self {
        let retry = RetryConfig::startup()
            .name("DatabaseStartup")
            .retry_on(DatastoreError::is_transient)
            .notify(|error, delay| {
                tracing::warn!(
                    error = %error,
                    retry_in_ms = delay.as_millis() as u64,
                    "database connection failed, retrying"
                );
            })
            .build();
        Self::with_retry(connector, retry)
    }

    /// Uses `retry` for every connection attempt instead of the startup
    /// profile.
    pub fn with_retry(connector: C, retry: RetryPolicy<DatastoreError>) -> Self {
        Self { connector, retry }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub async fn initialize(
        &self,
        config: &DatabaseConfig,
    ) -> Result<ConnectionRouter<C::Pool>, ConnectionInitError> {
        let endpoint = config.primary();
        tracing::info!(endpoint = %endpoint, "connecting to primary database");
        let primary = self.connect(&endpoint).await.map_err(|source| {
            tracing::error!(endpoint = %endpoint, error = %source, "failed to connect to primary database");
            ConnectionInitError::Primary {
                endpoint: endpoint.redacted_url(),
                source,
            }
        })?;
        tracing::info!(endpoint = %endpoint, "connected to primary database");
        let primary = Arc::new(primary);

        let Some(endpoint) = config.replica() else {
            tracing::info!("no read replica configured, reads use the primary");
            return Ok(ConnectionRouter::primary_only(primary, ReplicaStatus::NotConfigured));
        };

        tracing::info!(endpoint = %endpoint, "connecting to read replica");
        match self.connect(&endpoint).await {
            Ok(replica) => {
                tracing::info!(endpoint = %endpoint, "connected to read replica");
                Ok(ConnectionRouter::with_replica(primary, Arc::new(replica)))
            }
            Err(error) => {
                tracing::error!(
                    endpoint = %endpoint,
                    error = %error,
                    "failed to connect to read replica, falling back to primary for reads"
                );
                Ok(ConnectionRouter::primary_only(primary, ReplicaStatus::Unavailable))
            }
        }
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<C::Pool, DatastoreError> {
        let connector = &self.connector;
        self.retry
            .run(|| async move {
                let pool = connector.open(endpoint).await?;
                match pool.ping().await {
                    Ok(()) => Ok(pool),
                    Err(error) => {
                        pool.close();
                        Err(error)
                    }
                }
            })
            .await
    }
}

impl<C> std::fmt::Debug for ConnectionInitializer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionInitializer")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
