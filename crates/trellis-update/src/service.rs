//! Remote update service.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::TryStreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::component::{AvailableUpdate, Component};
use crate::error::{Result, UpdateError};

/// Installed versions sent with every update check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionReport {
    pub engine_version: String,
    pub guard_version: String,
    pub ui_version: String,
    pub wsp_type: String,
}

/// Answer of the check-update endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCheck {
    pub ui_update_available: bool,
    pub ui_download_url: String,
    pub ui_version: String,
    pub engine_update_available: bool,
    pub engine_download_url: String,
    pub engine_version: String,
    pub guard_update_available: bool,
    pub guard_download_url: String,
    pub guard_version: String,
}

impl UpdateCheck {
    /// Offered updates in apply order.
    pub fn available(&self) -> Vec<AvailableUpdate> {
        Component::ORDER
            .into_iter()
            .filter_map(|component| {
                let (flag, url, version) = match component {
                    Component::Ui => (self.ui_update_available, &self.ui_download_url, &self.ui_version),
                    Component::Guard => (
                        self.guard_update_available,
                        &self.guard_download_url,
                        &self.guard_version,
                    ),
                    Component::Engine => (
                        self.engine_update_available,
                        &self.engine_download_url,
                        &self.engine_version,
                    ),
                };
                flag.then(|| AvailableUpdate {
                    component,
                    url: url.clone(),
                    version: version.clone(),
                })
            })
            .collect()
    }
}

/// A download in flight.
pub struct UpdatePayload {
    /// Length announced by the server, if any.
    pub declared_len: Option<u64>,
    pub body: Pin<Box<dyn AsyncRead + Send>>,
}

impl std::fmt::Debug for UpdatePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePayload")
            .field("declared_len", &self.declared_len)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait UpdateService: Send + Sync {
    /// Ask which components have a newer version for this workspace.
    async fn check_update(&self, workspace_id: &str, report: &VersionReport) -> Result<UpdateCheck>;

    /// Open a download. Non-200 answers are errors.
    async fn fetch(&self, url: &str) -> Result<UpdatePayload>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Service
// ─────────────────────────────────────────────────────────────────────────────

/// Workspace service client:
/// `POST {endpoint}/workspaces/{id}/engine/checkupdate`.
pub struct HttpUpdateService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUpdateService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UpdateService for HttpUpdateService {
    async fn check_update(&self, workspace_id: &str, report: &VersionReport) -> Result<UpdateCheck> {
        if self.endpoint.is_empty() {
            return Err(UpdateError::NotConfigured);
        }
        let url = format!(
            "{}/workspaces/{}/engine/checkupdate",
            self.endpoint.trim_end_matches('/'),
            workspace_id
        );
        debug!(%url, "Checking for updates");

        let response = self
            .client
            .post(&url)
            .json(report)
            .send()
            .await
            .map_err(|e| UpdateError::Network(format!("Update check failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpdateError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch(&self, url: &str) -> Result<UpdatePayload> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::Network(format!("Download failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(UpdateError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let declared_len = response.content_length();
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(UpdatePayload {
            declared_len,
            body: Box::pin(StreamReader::new(stream)),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Static Service
// ─────────────────────────────────────────────────────────────────────────────

/// Canned update service for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticUpdateService {
    check: UpdateCheck,
    payloads: HashMap<String, (Vec<u8>, Option<u64>)>,
    reports: Mutex<Vec<(String, VersionReport)>>,
}

impl StaticUpdateService {
    pub fn new(check: UpdateCheck) -> Self {
        Self {
            check,
            ..Default::default()
        }
    }

    /// Serve `bytes` at `url` with an accurate content length.
    pub fn with_payload(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        self.with_declared_payload(url, bytes, Some(len))
    }

    /// Serve `bytes` at `url` announcing `declared_len`.
    pub fn with_declared_payload(
        mut self,
        url: impl Into<String>,
        bytes: Vec<u8>,
        declared_len: Option<u64>,
    ) -> Self {
        self.payloads.insert(url.into(), (bytes, declared_len));
        self
    }

    /// Every `(workspace_id, report)` passed to `check_update`.
    pub fn reports(&self) -> Vec<(String, VersionReport)> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl UpdateService for StaticUpdateService {
    async fn check_update(&self, workspace_id: &str, report: &VersionReport) -> Result<UpdateCheck> {
        self.reports
            .lock()
            .push((workspace_id.to_string(), report.clone()));
        Ok(self.check.clone())
    }

    async fn fetch(&self, url: &str) -> Result<UpdatePayload> {
        let (bytes, declared_len) = self.payloads.get(url).cloned().ok_or_else(|| {
            UpdateError::Download {
                url: url.to_string(),
                status: 404,
            }
        })?;
        Ok(UpdatePayload {
            declared_len,
            body: Box::pin(std::io::Cursor::new(bytes)),
        })
    }
}
