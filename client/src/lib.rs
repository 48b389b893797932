mod connection;
mod http;
mod progress;
mod snapshots;
mod system;

use std::time::Duration;

use async_trait::async_trait;
use pgtm_core::{
    ClientError,
    profiles::{ConnectionProfile, DatabaseInfo},
    snapshots::{
        CreateSnapshotRequest, RestoreOperation, RestoreSnapshotRequest, Snapshot,
        SnapshotProgress,
    },
    system::{SystemHealth, SystemInfo},
};

pub use connection::{ConnectedProfile, ConnectionOrchestrator, LAST_CONNECTION_KEY};
pub use http::{ApiResponse, HttpBackend};
pub use progress::{
    OPERATION_FAILED_MESSAGE, POLLING_NETWORK_ERROR_MESSAGE, PollerReport, ProgressPoller,
};
pub use snapshots::{SnapshotController, SnapshotEvent};
pub use system::{SystemReport, SystemStatus};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            poll_interval: POLL_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// The snapshot service's HTTP API, one method per endpoint.
///
/// Implementations map a `success: false` envelope to
/// [`ClientError::Rejected`], a missing response to [`ClientError::Network`]
/// and an undecodable one to [`ClientError::MalformedResponse`].
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn test_connection(&self, profile: &ConnectionProfile) -> ClientResult<()>;
    async fn database_info(&self, profile: &ConnectionProfile) -> ClientResult<DatabaseInfo>;
    async fn save_connection(&self, profile: &ConnectionProfile)
    -> ClientResult<ConnectionProfile>;
    async fn list_snapshots(&self, database_id: &str) -> ClientResult<Vec<Snapshot>>;
    async fn get_snapshot(&self, snapshot_id: &str) -> ClientResult<Snapshot>;
    async fn create_snapshot(&self, request: &CreateSnapshotRequest) -> ClientResult<Snapshot>;
    async fn delete_snapshot(&self, snapshot_id: &str) -> ClientResult<()>;
    async fn restore_snapshot(
        &self,
        request: &RestoreSnapshotRequest,
    ) -> ClientResult<RestoreOperation>;
    async fn snapshot_progress(&self, snapshot_id: &str) -> ClientResult<SnapshotProgress>;
    async fn system_health(&self) -> ClientResult<SystemHealth>;
    async fn system_info(&self) -> ClientResult<SystemInfo>;
}
