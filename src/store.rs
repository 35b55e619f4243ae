//! Consumed interface of the durable cluster store.
//!
//! The store itself (a document database behind the HTTP layer) is an
//! external collaborator; this crate only defines the surface it relies on.
//! [`crate::testing::MemoryClusterStore`] implements it for tests.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::error::StoreError;

/// Persisted marker that a cluster is currently connected.
///
/// Cross-restart visibility only: a record surviving a process restart is an
/// orphan, never a live channel handle. The manager clears orphans on startup
/// via [`crate::manager::ConnectionManager::reconcile_stale_records`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub cluster_id: String,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Durable cluster configuration and connection-marker storage.
pub trait ClusterStore: Send + Sync + 'static {
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ClusterConfig>, StoreError>> + Send;

    fn save(&self, config: &ClusterConfig) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn save_connection_record(
        &self,
        record: &ConnectionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove_connection_record(
        &self,
        cluster_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Enumerate persisted records; used only for startup reconciliation.
    fn connection_records(
        &self,
    ) -> impl Future<Output = Result<Vec<ConnectionRecord>, StoreError>> + Send;

    fn touch_last_activity(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
