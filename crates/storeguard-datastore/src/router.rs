use crate::pool::ConnectionPool;
use std::sync::Arc;

/// What became of the read replica at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaStatus {
    /// No replica host was configured.
    NotConfigured,
    /// The replica answered and serves reads.
    Connected,
    /// The replica could not be reached; reads go to the primary.
    Unavailable,
}

impl ReplicaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaStatus::NotConfigured => "not_configured",
            ReplicaStatus::Connected => "connected",
            ReplicaStatus::Unavailable => "unavailable",
        }
    }
}

/// Holds the primary pool and the pool reads go to.
///
/// Writes always use the primary. Reads use the replica when it connected at
/// startup and the primary otherwise; the choice is fixed for the life of the
/// router, so there is always a read pool.
pub struct ConnectionRouter<P> {
    primary: Arc<P>,
    read: Arc<P>,
    replica_status: ReplicaStatus,
}

impl<P: ConnectionPool> ConnectionRouter<P> {
    /// Reads and writes both go to `primary`.
    pub fn primary_only(primary: Arc<P>, replica_status: ReplicaStatus) -> Self {
        debug_assert!(replica_status != ReplicaStatus::Connected);
        Self {
            read: Arc::clone(&primary),
            primary,
            replica_status,
        }
    }

    /// Reads go to `replica`, writes to `primary`.
    pub fn with_replica(primary: Arc<P>, replica: Arc<P>) -> Self {
        Self {
            primary,
            read: replica,
            replica_status: ReplicaStatus::Connected,
        }
    }

    pub fn for_write(&self) -> Arc<P> {
        Arc::clone(&self.primary)
    }

    pub fn for_read(&self) -> Arc<P> {
        Arc::clone(&self.read)
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The replica pool, when reads do not share the primary.
    pub fn replica(&self) -> Option<&P> {
        (!self.reads_use_primary()).then_some(&*self.read)
    }

    pub fn replica_status(&self) -> ReplicaStatus {
        self.replica_status
    }

    /// `true` when reads share the primary pool.
    pub fn reads_use_primary(&self) -> bool {
        Arc::ptr_eq(&self.primary, &self.read)
    }

    /// Closes the primary and, if it is a separate pool, the replica.
    pub fn close(&self) {
        self.primary.close();
        if !self.reads_use_primary() {
            self.read.close();
        }
    }
}

impl<P> std::fmt::Debug for ConnectionRouter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRouter")
            .field("replica_status", &self.replica_status)
            .field("reads_use_primary", &Arc::ptr_eq(&self.primary, &self.read))
            .finish()
    }
}
