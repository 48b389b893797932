use std::sync::Arc;

use pgtm_core::system::{SystemHealth, SystemInfo};

use crate::{BackendClient, ClientResult};

#[derive(Clone, Debug)]
pub struct SystemReport {
    pub health: SystemHealth,
    /// Absent when the info endpoint failed; that failure is only logged.
    pub info: Option<SystemInfo>,
}

impl SystemReport {
    pub fn summary(&self) -> String {
        let overall = if self.health.is_healthy() {
            "Healthy"
        } else {
            "Degraded"
        };
        let tools = if self.health.tools_available() {
            "Available"
        } else {
            "Not Available"
        };
        format!("System Status: {overall}, PostgreSQL Tools: {tools}")
    }
}

/// Read-only view of the backend's own health.
pub struct SystemStatus<B: ?Sized> {
    backend: Arc<B>,
}

impl<B> SystemStatus<B>
where
    B: BackendClient + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn check_health(&self) -> ClientResult<SystemHealth> {
        self.backend.system_health().await
    }

    pub async fn system_info(&self) -> ClientResult<SystemInfo> {
        self.backend.system_info().await
    }

    /// Health is required; detailed info is best effort.
    pub async fn report(&self) -> ClientResult<SystemReport> {
        let health = self.check_health().await?;
        let info = match self.system_info().await {
            Ok(info) => Some(info),
            Err(err) => {
                tracing::error!("Failed to get system info: {err}");
                None
            }
        };
        Ok(SystemReport { health, info })
    }
}
