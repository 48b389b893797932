use std::{fmt::Write as _, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, header};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use pgtm_core::{
    ClientError,
    profiles::{ConnectionProfile, DatabaseInfo},
    snapshots::{
        CreateSnapshotRequest, RestoreOperation, RestoreSnapshotRequest, Snapshot,
        SnapshotProgress,
    },
    system::{SystemHealth, SystemInfo},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned, de::IgnoredAny};

use crate::{BackendClient, ClientConfig, ClientResult};

const API_PREFIX: &str = "/api/v1";

/// Envelope every backend response is wrapped in, whatever the HTTP status.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Splits the envelope into its payload or a rejection. `fallback` is
    /// used when the backend rejects without saying why.
    pub fn into_result(self, fallback: &str) -> ClientResult<Option<T>> {
        if self.success {
            return Ok(self.data);
        }
        let message = self
            .error
            .filter(|error| !error.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        Err(ClientError::rejected(message))
    }

    pub fn into_data(self, fallback: &str) -> ClientResult<T> {
        self.into_result(fallback)?
            .ok_or_else(|| ClientError::malformed("successful response carried no data"))
    }
}

pub struct HttpBackend {
    base_url: String,
    timeout: Duration,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<ApiResponse<T>> {
        self.send(Method::GET, path, None).await
    }

    async fn post<T, P>(&self, path: &str, payload: &P) -> ClientResult<ApiResponse<T>>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized + Sync,
    {
        let body = serde_json::to_vec(payload)
            .map_err(|err| ClientError::malformed(format!("failed to encode request: {err}")))?;
        self.send(Method::POST, path, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<ApiResponse<T>> {
        self.send(Method::DELETE, path, None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<ApiResponse<T>> {
        let url = format!("{}{API_PREFIX}{path}", self.base_url);
        tracing::debug!(%method, %url, "backend request");

        let mut builder = Request::builder().method(method.clone()).uri(&url);
        let payload = match body {
            Some(bytes) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Full::new(Bytes::from(bytes))
            }
            None => Full::new(Bytes::new()),
        };
        let request = builder
            .body(payload)
            .map_err(|err| ClientError::network(format!("{method} {url}: {err}")))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|err| ClientError::network(format!("{method} {url}: {err}")))?;
            let status = response.status();
            let collected = response
                .into_body()
                .collect()
                .await
                .map_err(|err| ClientError::network(format!("{method} {url}: {err}")))?;
            Ok::<_, ClientError>((status, collected.to_bytes()))
        };

        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                ClientError::network(format!(
                    "{method} {url}: no response within {:?}",
                    self.timeout
                ))
            })??;

        serde_json::from_slice::<ApiResponse<T>>(&bytes).map_err(|err| {
            tracing::warn!(%method, %url, %status, "undecodable backend response: {err}");
            ClientError::malformed(format!("{method} {url} ({status}): {err}"))
        })
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn test_connection(&self, profile: &ConnectionProfile) -> ClientResult<()> {
        self.post::<IgnoredAny, _>("/database/test", profile)
            .await?
            .into_result("Connection failed")?;
        Ok(())
    }

    async fn database_info(&self, profile: &ConnectionProfile) -> ClientResult<DatabaseInfo> {
        self.post("/database/info", profile)
            .await?
            .into_data("Failed to get database info")
    }

    async fn save_connection(
        &self,
        profile: &ConnectionProfile,
    ) -> ClientResult<ConnectionProfile> {
        self.post("/database/save", profile)
            .await?
            .into_data("Failed to save connection")
    }

    async fn list_snapshots(&self, database_id: &str) -> ClientResult<Vec<Snapshot>> {
        let path = format!("/snapshots/?database_id={}", encode_component(database_id));
        let snapshots = self
            .get::<Vec<Snapshot>>(&path)
            .await?
            .into_result("Failed to load snapshots")?;
        Ok(snapshots.unwrap_or_default())
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> ClientResult<Snapshot> {
        let path = format!("/snapshots/{}", encode_component(snapshot_id));
        self.get(&path).await?.into_data("Snapshot not found")
    }

    async fn create_snapshot(&self, request: &CreateSnapshotRequest) -> ClientResult<Snapshot> {
        self.post("/snapshots/create", request)
            .await?
            .into_data("Failed to create snapshot")
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> ClientResult<()> {
        let path = format!("/snapshots/{}", encode_component(snapshot_id));
        self.delete::<IgnoredAny>(&path)
            .await?
            .into_result("Failed to delete snapshot")?;
        Ok(())
    }

    async fn restore_snapshot(
        &self,
        request: &RestoreSnapshotRequest,
    ) -> ClientResult<RestoreOperation> {
        self.post("/snapshots/restore", request)
            .await?
            .into_data("Failed to start restore operation")
    }

    async fn snapshot_progress(&self, snapshot_id: &str) -> ClientResult<SnapshotProgress> {
        let path = format!("/snapshots/{}/progress", encode_component(snapshot_id));
        self.get(&path).await?.into_data("Failed to get progress")
    }

    async fn system_health(&self) -> ClientResult<SystemHealth> {
        let mut response = self.get::<SystemHealth>("/system/health").await?;
        // A degraded system answers `success: false` but still reports its state.
        if let Some(health) = response.data.take() {
            return Ok(health);
        }
        response.into_data("Failed to check system health")
    }

    async fn system_info(&self) -> ClientResult<SystemInfo> {
        self.get("/system/info")
            .await?
            .into_data("Failed to get system info")
    }
}

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
