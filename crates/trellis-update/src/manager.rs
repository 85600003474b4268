//! Update check, per-component apply and the periodic loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use trellis_config::ConfigStore;
use trellis_engine::ProcessRunner;

use crate::apply::{apply_ui, run_supervisor};
use crate::component::{AvailableUpdate, Component};
use crate::download::download;
use crate::error::{Result, UpdateError};
use crate::service::{UpdateService, VersionReport};
use crate::unpack::unpack;

/// What one update pass did.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub applied: Vec<Component>,
    pub failed: Vec<(Component, UpdateError)>,
}

impl UpdateSummary {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.failed.is_empty()
    }
}

pub struct UpdateManager {
    config: Arc<ConfigStore>,
    service: Arc<dyn UpdateService>,
    runner: Arc<dyn ProcessRunner>,
}

impl UpdateManager {
    pub fn new(
        config: Arc<ConfigStore>,
        service: Arc<dyn UpdateService>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            service,
            runner,
        }
    }

    /// Installed versions as recorded in the configuration.
    pub fn version_report(&self) -> VersionReport {
        self.config.read(|c| VersionReport {
            engine_version: c.engine.version.clone(),
            guard_version: c.guard.version.clone(),
            ui_version: c.frontend.version.clone(),
            wsp_type: c.workspace.workspace_type.clone(),
        })
    }

    /// Check for updates and apply each offered component.
    ///
    /// Only the check itself can fail the call; a component that fails to
    /// download or apply is recorded in the summary and the remaining ones
    /// still run.
    pub async fn check_and_update(&self) -> Result<UpdateSummary> {
        let workspace_id = self.config.read(|c| c.workspace.id.clone());
        let check = self
            .service
            .check_update(&workspace_id, &self.version_report())
            .await?;

        let mut summary = UpdateSummary::default();
        for update in check.available() {
            info!(component = %update.component, version = %update.version, "Update available, downloading");
            match self.download_and_apply(&update).await {
                Ok(()) => summary.applied.push(update.component),
                Err(e) => {
                    warn!(component = %update.component, error = %e, "Update failed");
                    summary.failed.push((update.component, e));
                }
            }
        }
        if summary.is_empty() {
            debug!("No updates available");
        }
        Ok(summary)
    }

    /// Download, unpack, record the version and apply one component.
    pub async fn download_and_apply(&self, update: &AvailableUpdate) -> Result<()> {
        let archive = download(self.service.as_ref(), &update.url).await?;

        let (staging, engine_path, ui_dir) = self.config.read(|c| {
            (
                c.update_staging_dir(update.component.as_str()),
                c.engine_path(),
                c.ui_dir(),
            )
        });
        let files = unpack(archive.file.path().to_path_buf(), staging.clone()).await?;
        debug!(component = %update.component, files, staging = %staging.display(), "Update staged");

        self.config
            .set_value(update.component.version_key(), update.version.as_str())?;

        match update.component.supervisor_script() {
            None => {
                tokio::task::spawn_blocking(move || apply_ui(&staging, &ui_dir))
                    .await
                    .map_err(|e| UpdateError::Io(std::io::Error::other(e)))??;
            }
            Some(script) => run_supervisor(self.runner.as_ref(), &engine_path, script).await?,
        }
        info!(component = %update.component, version = %update.version, "Update applied");
        Ok(())
    }

    /// Re-run [`check_and_update`](Self::check_and_update) every configured
    /// interval until `cancel` fires. Returns at once when updates are
    /// disabled.
    pub async fn run_periodic(self: Arc<Self>, cancel: CancellationToken) {
        let settings = self.config.read(|c| c.update.clone());
        if !settings.enabled {
            info!("Self-update disabled");
            return;
        }
        let period = Duration::from_secs(settings.interval_secs.max(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        info!(interval_secs = period.as_secs(), "Update loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Update loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.check_and_update().await {
                        error!(error = %e, "Update check failed");
                    }
                }
            }
        }
    }

    /// Spawn [`run_periodic`](Self::run_periodic) on the runtime.
    pub fn spawn_periodic(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run_periodic(cancel))
    }
}
