//! Shared client lifecycle
//!
//! A [`ClientHandle`] is a lease on one [`DocumentClient`]. Cloning takes
//! another lease, dropping gives it back, and dropping the last lease closes
//! the client. Every repository built from the same handle shares the one
//! client and its connection pool.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::driver::{DocumentClient, DocumentCollection};

struct Lease {
    client: Arc<dyn DocumentClient>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        info!("last client lease released, closing client");
        self.client.close();
    }
}

/// A lease on a shared database client
#[derive(Clone)]
pub struct ClientHandle {
    lease: Arc<Lease>,
}

impl ClientHandle {
    /// Take the first lease on `client`
    pub fn new(client: Arc<dyn DocumentClient>) -> Self {
        Self {
            lease: Arc::new(Lease { client }),
        }
    }

    /// Handle to `database.name`
    pub fn collection(&self, database: &str, name: &str) -> Arc<dyn DocumentCollection> {
        self.lease.client.collection(database, name)
    }

    /// The underlying client. Callers must not close it directly.
    pub fn client(&self) -> &dyn DocumentClient {
        self.lease.client.as_ref()
    }

    /// Number of live leases, this one included
    pub fn lease_count(&self) -> usize {
        Arc::strong_count(&self.lease)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("leases", &self.lease_count())
            .finish()
    }
}
