//! Shared handles passed to every engine component.

use std::sync::Arc;

use trellis_config::ConfigStore;
use trellis_store::ArtifactStore;

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::tokens::TokenProvider;

/// Configuration, record store, clock and token provider for one engine.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Arc<ConfigStore>,
    pub store: Arc<dyn ArtifactStore>,
    pub clock: Arc<dyn Clock>,
    pub tokens: Arc<dyn TokenProvider>,
}

impl EngineContext {
    pub fn new(
        config: Arc<ConfigStore>,
        store: Arc<dyn ArtifactStore>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            tokens,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured workspace id, validated as a UUID.
    pub fn workspace_id(&self) -> Result<String> {
        let raw = self.config.read(|c| c.workspace.id.clone());
        uuid::Uuid::parse_str(raw.trim())
            .map(|id| id.to_string())
            .map_err(|_| EngineError::WorkspaceId(raw))
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config.path())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::StaticTokenProvider;
    use trellis_config::WorkspaceConfig;
    use trellis_store::MockArtifactStore;

    fn context(workspace_id: &str) -> EngineContext {
        let mut config = WorkspaceConfig::default();
        config.workspace.id = workspace_id.to_string();
        EngineContext::new(
            Arc::new(ConfigStore::in_memory(config).unwrap()),
            Arc::new(MockArtifactStore::new()),
            Arc::new(StaticTokenProvider::new()),
        )
    }

    #[test]
    fn test_workspace_id_is_validated() {
        let ctx = context("3F1C8A52-5F8E-4BD0-9A43-0D6C2A1B7E90");
        assert_eq!(
            ctx.workspace_id().unwrap(),
            "3f1c8a52-5f8e-4bd0-9a43-0d6c2a1b7e90"
        );

        let err = context("workspace-7").workspace_id().unwrap_err();
        assert!(matches!(err, EngineError::WorkspaceId(id) if id == "workspace-7"));
    }
}
