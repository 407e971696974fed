use crate::pool::ConnectionPool;
use crate::router::ConnectionRouter;

/// Reachability of the read replica as seen by the last health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaHealth {
    Healthy,
    Unhealthy,
    /// There is no replica separate from the primary to check.
    Unknown,
}

impl ReplicaHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaHealth::Healthy => "healthy",
            ReplicaHealth::Unhealthy => "unhealthy",
            ReplicaHealth::Unknown => "unknown",
        }
    }
}

/// Outcome of pinging the datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub primary_healthy: bool,
    /// Why the primary ping failed, if it did.
    pub primary_error: Option<String>,
    pub replica: ReplicaHealth,
}

impl HealthReport {
    /// Only the primary decides overall health.
    pub fn is_healthy(&self) -> bool {
        self.primary_healthy
    }
}

/// Pings the primary and, when reads use a separate pool, the replica.
///
/// Health checks bypass the breaker and the retry policy so they report the
/// datastore as it is right now.
pub async fn check<P: ConnectionPool>(router: &ConnectionRouter<P>) -> HealthReport {
    let primary_error = match router.primary().ping().await {
        Ok(()) => None,
        Err(error) => {
            tracing::warn!(error = %error, "primary database health check failed");
            Some(error.to_string())
        }
    };

    let replica = match router.replica() {
        None => ReplicaHealth::Unknown,
        Some(pool) => match pool.ping().await {
            Ok(()) => ReplicaHealth::Healthy,
            Err(error) => {
                tracing::warn!(error = %error, "read replica health check failed");
                ReplicaHealth::Unhealthy
            }
        },
    };

    HealthReport {
        primary_healthy: primary_error.is_none(),
        primary_error,
        replica,
    }
}
