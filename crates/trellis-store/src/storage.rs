//! Storage abstraction for artifact records.
//!
//! ```text
//! ArtifactStore (trait)         - artifact, parameter and schedule records
//!     └── SqliteArtifactStore   - embedded SQLite implementation
//!     └── MockArtifactStore     - in-memory mock for testing
//! ```
//!
//! Mutations return the number of rows affected so callers can tell a
//! no-op save apart from a failed one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use trellis_types::{Artifact, ArtifactKind, Parameter, Schedule};

use crate::{Result, StoreError};

/// Record store used by the lifecycle controller.
pub trait ArtifactStore: Send + Sync {
    // ── Artifact Operations ─────────────────────────────────────────────

    /// Find an artifact by the id of its source-control project.
    fn find_artifact(&self, kind: ArtifactKind, external_id: i64) -> Result<Option<Artifact>>;

    /// Get an artifact by internal id.
    fn get_artifact(&self, id: &str) -> Result<Option<Artifact>>;

    /// Insert a new artifact record.
    fn create_artifact(&self, artifact: &Artifact) -> Result<usize>;

    /// Overwrite an existing artifact record (matched by internal id).
    fn save_artifact(&self, artifact: &Artifact) -> Result<usize>;

    /// Delete an artifact together with its parameters and schedules.
    fn delete_artifact(&self, kind: ArtifactKind, external_id: i64) -> Result<usize>;

    /// List artifacts of a kind, newest first.
    fn list_artifacts(&self, kind: ArtifactKind) -> Result<Vec<Artifact>>;

    // ── Parameter Operations ────────────────────────────────────────────

    /// Parameters of an artifact, in creation order.
    fn list_parameters(&self, artifact_id: &str) -> Result<Vec<Parameter>>;

    /// Insert a parameter. The parameter must carry an id.
    fn create_parameter(&self, artifact_id: &str, parameter: &Parameter) -> Result<usize>;

    /// Overwrite a parameter (matched by id).
    fn update_parameter(&self, artifact_id: &str, parameter: &Parameter) -> Result<usize>;

    // ── Schedule Operations ─────────────────────────────────────────────

    /// Insert or update the schedule for `(workflow_id, name)`.
    fn upsert_schedule(&self, schedule: &Schedule) -> Result<usize>;

    /// Schedules of a workflow.
    fn list_schedules(&self, workflow_id: &str) -> Result<Vec<Schedule>>;

    /// Schedules flagged to run when the workspace starts.
    fn startup_schedules(&self) -> Result<Vec<Schedule>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock
// ─────────────────────────────────────────────────────────────────────────────

/// Mock implementation of [`ArtifactStore`] for testing.
///
/// Writes can be made to fail (returning zero rows affected) to exercise
/// save-failure paths.
#[derive(Debug, Default)]
pub struct MockArtifactStore {
    artifacts: Mutex<HashMap<String, Artifact>>,
    parameters: Mutex<HashMap<String, Vec<Parameter>>>,
    schedules: Mutex<Vec<Schedule>>,
    reject_saves: AtomicBool,
}

impl MockArtifactStore {
    /// Create a new empty mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `save_artifact` calls affect zero rows.
    pub fn reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }

    /// Number of stored schedules (all workflows).
    pub fn schedule_count(&self) -> usize {
        self.schedules.lock().len()
    }

    /// Number of stored artifacts (all kinds).
    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().len()
    }
}

impl ArtifactStore for MockArtifactStore {
    fn find_artifact(&self, kind: ArtifactKind, external_id: i64) -> Result<Option<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .values()
            .find(|a| a.kind == kind && a.external_id == external_id)
            .cloned())
    }

    fn get_artifact(&self, id: &str) -> Result<Option<Artifact>> {
        Ok(self.artifacts.lock().get(id).cloned())
    }

    fn create_artifact(&self, artifact: &Artifact) -> Result<usize> {
        let mut artifacts = self.artifacts.lock();
        let duplicate = artifacts.values().any(|a| {
            a.id == artifact.id
                || (a.kind == artifact.kind && a.external_id == artifact.external_id)
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} {} already exists",
                artifact.kind, artifact.external_id
            )));
        }
        artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(1)
    }

    fn save_artifact(&self, artifact: &Artifact) -> Result<usize> {
        if self.reject_saves.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let mut artifacts = self.artifacts.lock();
        match artifacts.get_mut(&artifact.id) {
            Some(existing) => {
                *existing = artifact.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_artifact(&self, kind: ArtifactKind, external_id: i64) -> Result<usize> {
        let mut artifacts = self.artifacts.lock();
        let Some(id) = artifacts
            .values()
            .find(|a| a.kind == kind && a.external_id == external_id)
            .map(|a| a.id.clone())
        else {
            return Ok(0);
        };
        artifacts.remove(&id);
        self.parameters.lock().remove(&id);
        self.schedules.lock().retain(|s| s.workflow_id != id);
        Ok(1)
    }

    fn list_artifacts(&self, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let mut list: Vec<Artifact> = self
            .artifacts
            .lock()
            .values()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(list)
    }

    fn list_parameters(&self, artifact_id: &str) -> Result<Vec<Parameter>> {
        Ok(self
            .parameters
            .lock()
            .get(artifact_id)
            .cloned()
            .unwrap_or_default())
    }

    fn create_parameter(&self, artifact_id: &str, parameter: &Parameter) -> Result<usize> {
        if parameter.id.is_none() {
            return Err(StoreError::Conflict("parameter id is required".into()));
        }
        self.parameters
            .lock()
            .entry(artifact_id.to_string())
            .or_default()
            .push(parameter.clone());
        Ok(1)
    }

    fn update_parameter(&self, artifact_id: &str, parameter: &Parameter) -> Result<usize> {
        let mut parameters = self.parameters.lock();
        let Some(list) = parameters.get_mut(artifact_id) else {
            return Ok(0);
        };
        match list.iter_mut().find(|p| p.id == parameter.id) {
            Some(existing) => {
                *existing = parameter.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn upsert_schedule(&self, schedule: &Schedule) -> Result<usize> {
        let mut schedules = self.schedules.lock();
        match schedules
            .iter_mut()
            .find(|s| s.workflow_id == schedule.workflow_id && s.name == schedule.name)
        {
            Some(existing) => {
                let id = existing.id.clone();
                *existing = schedule.clone();
                existing.id = id;
            }
            None => {
                let mut schedule = schedule.clone();
                schedule.id.get_or_insert_with(trellis_types::new_id);
                schedules.push(schedule);
            }
        }
        Ok(1)
    }

    fn list_schedules(&self, workflow_id: &str) -> Result<Vec<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .iter()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    fn startup_schedules(&self) -> Result<Vec<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .iter()
            .filter(|s| s.start)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::{Status, new_id};

    fn app(external_id: i64) -> Artifact {
        Artifact {
            id: new_id(),
            external_id,
            kind: ArtifactKind::App,
            name: "notebook".into(),
            status: Status::Installed,
            workspace_id: String::new(),
            timestamp: chrono::Utc::now(),
            path: "apps/notebook".into(),
            repo_url: String::new(),
            artifact_type: "installed".into(),
            topics: vec![],
        }
    }

    #[test]
    fn test_mock_reject_saves() {
        let store = MockArtifactStore::new();
        let mut a = app(1);
        store.create_artifact(&a).unwrap();

        a.status = Status::Started;
        store.reject_saves(true);
        assert_eq!(store.save_artifact(&a).unwrap(), 0);
        store.reject_saves(false);
        assert_eq!(store.save_artifact(&a).unwrap(), 1);
        assert_eq!(
            store.get_artifact(&a.id).unwrap().unwrap().status,
            Status::Started
        );
    }

    #[test]
    fn test_mock_schedule_upsert() {
        let store = MockArtifactStore::new();
        let mut s = Schedule {
            id: Some(new_id()),
            workflow_id: "wf".into(),
            name: "boot".into(),
            start: true,
            end: false,
            cron_expression: String::new(),
            time_zone: String::new(),
            timestamp: chrono::Utc::now(),
        };
        store.upsert_schedule(&s).unwrap();
        s.start = false;
        s.id = None;
        store.upsert_schedule(&s).unwrap();

        assert_eq!(store.schedule_count(), 1);
        assert!(store.startup_schedules().unwrap().is_empty());
        assert!(store.list_schedules("wf").unwrap()[0].id.is_some());
    }
}
