use std::collections::HashSet;

use trellis_types::{Artifact, ArtifactKind, Status};

use super::LifecycleController;
use crate::error::Result;

impl LifecycleController {
    /// Apps currently installed through the lifecycle (type `installed`),
    /// newest first.
    pub fn list_apps(&self) -> Result<Vec<Artifact>> {
        Ok(self
            .ctx
            .store
            .list_artifacts(ArtifactKind::App)?
            .into_iter()
            .filter(|a| a.is_installed_type() && a.status != Status::Uninstalled)
            .collect())
    }

    /// Most recently used workflows, one entry per name, newest first.
    pub fn workflow_history(&self, limit: usize) -> Result<Vec<Artifact>> {
        let mut seen = HashSet::new();
        Ok(self
            .ctx
            .store
            .list_artifacts(ArtifactKind::Workflow)?
            .into_iter()
            .filter(|a| seen.insert(a.name.clone()))
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use trellis_store::ArtifactStore;
    use trellis_types::{INSTALLED_TYPE, new_id};

    use crate::lifecycle::harness::Harness;

    use super::*;

    fn record(kind: ArtifactKind, external_id: i64, name: &str, age_minutes: i64) -> Artifact {
        Artifact {
            id: new_id(),
            external_id,
            kind,
            name: name.into(),
            status: Status::Installed,
            workspace_id: "ws".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap()
                - Duration::minutes(age_minutes),
            path: format!("acme/{name}"),
            repo_url: String::new(),
            artifact_type: INSTALLED_TYPE.into(),
            topics: Vec::new(),
        }
    }

    #[test]
    fn test_list_apps_only_installed_type() {
        let h = Harness::new();
        h.store.create_artifact(&record(ArtifactKind::App, 1, "notebook", 5)).unwrap();
        let mut system = record(ArtifactKind::App, 2, "proxy", 1);
        system.artifact_type = "system".into();
        h.store.create_artifact(&system).unwrap();
        h.store.create_artifact(&record(ArtifactKind::Workflow, 3, "demo", 0)).unwrap();

        let apps = h.controller.list_apps().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "notebook");
    }

    #[test]
    fn test_history_is_distinct_newest_first_and_bounded() {
        let h = Harness::new();
        h.store.create_artifact(&record(ArtifactKind::Workflow, 1, "report", 30)).unwrap();
        h.store.create_artifact(&record(ArtifactKind::Workflow, 2, "sync", 20)).unwrap();
        h.store.create_artifact(&record(ArtifactKind::Workflow, 3, "report", 10)).unwrap();
        h.store.create_artifact(&record(ArtifactKind::Workflow, 4, "backup", 40)).unwrap();

        let history = h.controller.workflow_history(10).unwrap();
        let names: Vec<_> = history.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["report", "sync", "backup"]);
        assert_eq!(history[0].external_id, 3);

        assert_eq!(h.controller.workflow_history(1).unwrap().len(), 1);
    }
}
