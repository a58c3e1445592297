//! Serialized read-merge-validate-write updates of stored runs.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::datamodel::TaskRun;
use crate::error::{RunUpdateError, ValidationError};
use crate::storage::{StoredRun, TaskStore};
use crate::utils::json_merge::deep_merge;

/// Applies partial JSON patches to stored runs.
///
/// Every update holds one gate for its whole read-merge-validate-write cycle,
/// so at most one update runs at a time no matter which run it targets, and a
/// later update always sees the fully written result of an earlier one. Share
/// a single updater (e.g. behind an `Arc`) across the process.
pub struct RunUpdater<S: ?Sized> {
    gate: Mutex<()>,
    store: Arc<S>,
}

impl<S: TaskStore + ?Sized> RunUpdater<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            gate: Mutex::new(()),
            store,
        }
    }

    /// The store updates are written to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Deep-merges `patch` into a stored run and persists the result.
    ///
    /// Returns the merged, validated run. If the merged document fails
    /// validation nothing is written and the stored run is unchanged.
    pub async fn update_run(
        &self,
        project_id: &str,
        task_id: &str,
        run_id: &str,
        patch: Value,
    ) -> Result<TaskRun, RunUpdateError> {
        if !patch.is_object() {
            return Err(RunUpdateError::InvalidPatch);
        }

        let _guard = self.gate.lock().await;

        let StoredRun { path, run } = self.store.run(project_id, task_id, run_id).await?;

        let mut document = serde_json::to_value(&run)?;
        deep_merge(&mut document, patch);

        let updated = match TaskRun::from_value(document) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(run_id, error = %e, "Rejected run update");
                return Err(e.into());
            }
        };
        if updated.id != run.id {
            return Err(ValidationError::IdChanged {
                expected: run.id,
                actual: updated.id,
            }
            .into());
        }

        let stored = StoredRun { path, run: updated };
        self.store.write_run(&stored).await?;

        info!(
            project_id,
            task_id,
            run_id,
            path = %stored.path.display(),
            "Updated run"
        );
        Ok(stored.run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{Task, TaskOutput};
    use crate::error::StoreError;
    use crate::storage::FsTaskStore;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, RunUpdater<FsTaskStore>, Task, StoredRun) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FsTaskStore::new(temp_dir.path());
        store
            .create_project("proj")
            .await
            .expect("Create project should succeed");
        let task = Task::new("Echo", "Repeat the input");
        store
            .save_task("proj", &task)
            .await
            .expect("Save task should succeed");
        let run = TaskRun::new("hello", TaskOutput::new("old text"));
        let stored = store
            .save_run("proj", &task.id, &run)
            .await
            .expect("Save run should succeed");
        (temp_dir, RunUpdater::new(Arc::new(store)), task, stored)
    }

    #[tokio::test]
    async fn test_update_merges_nested_field() {
        let (_dir, updater, task, stored) = setup().await;
        let before = serde_json::to_value(&stored.run).expect("serialization should work");

        let updated = updater
            .update_run(
                "proj",
                &task.id,
                &stored.run.id,
                json!({"output": {"output": "new text"}}),
            )
            .await
            .expect("Update should succeed");
        assert_eq!(updated.output.output, "new text");

        let after = serde_json::to_value(&updated).expect("serialization should work");
        assert_eq!(after["id"], before["id"]);
        assert_eq!(after["input"], before["input"]);
        assert_eq!(after["created_at"], before["created_at"]);

        let reloaded = updater
            .store()
            .run("proj", &task.id, &stored.run.id)
            .await
            .expect("Load should succeed");
        assert_eq!(reloaded.path, stored.path);
        assert_eq!(reloaded.run, updated);
    }

    #[tokio::test]
    async fn test_invalid_merge_leaves_run_unchanged() {
        let (_dir, updater, task, stored) = setup().await;
        let before = tokio::fs::read_to_string(&stored.path)
            .await
            .expect("Read should succeed");

        let result = updater
            .update_run(
                "proj",
                &task.id,
                &stored.run.id,
                json!({"output": {"rating": {"type": "five_star", "value": 9}}}),
            )
            .await;
        assert!(matches!(result, Err(RunUpdateError::Validation(_))));

        let result = updater
            .update_run("proj", &task.id, &stored.run.id, json!({"input": 42}))
            .await;
        assert!(matches!(
            result,
            Err(RunUpdateError::Validation(ValidationError::Schema(_)))
        ));

        let after = tokio::fs::read_to_string(&stored.path)
            .await
            .expect("Read should succeed");
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_id_cannot_change() {
        let (_dir, updater, task, stored) = setup().await;
        let result = updater
            .update_run("proj", &task.id, &stored.run.id, json!({"id": "other"}))
            .await;
        assert!(matches!(
            result,
            Err(RunUpdateError::Validation(ValidationError::IdChanged { .. }))
        ));
    }

    #[tokio::test]
    async fn test_non_object_patch_rejected() {
        let (_dir, updater, task, stored) = setup().await;
        let result = updater
            .update_run("proj", &task.id, &stored.run.id, json!(["output"]))
            .await;
        assert!(matches!(result, Err(RunUpdateError::InvalidPatch)));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (_dir, updater, task, stored) = setup().await;

        let result = updater
            .update_run("missing", &task.id, &stored.run.id, json!({}))
            .await;
        assert!(matches!(
            result,
            Err(RunUpdateError::Store(StoreError::ProjectNotFound(_)))
        ));

        let result = updater
            .update_run("proj", "missing", &stored.run.id, json!({}))
            .await;
        assert!(matches!(
            result,
            Err(RunUpdateError::Store(StoreError::TaskNotFound(_)))
        ));

        let result = updater
            .update_run("proj", &task.id, "missing", json!({}))
            .await;
        let err = result.expect_err("should fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_ignores_malformed_sibling_runs() {
        let (_dir, updater, task, stored) = setup().await;
        let runs_dir = stored.path.parent().expect("run should live in a directory");

        let sibling = TaskRun::new("other", TaskOutput::new("other text"));
        let mut extra = serde_json::to_value(&sibling).expect("serialization should work");
        extra["model_type"] = json!("task_run");
        tokio::fs::write(
            runs_dir.join("with_extra.json"),
            serde_json::to_string_pretty(&extra).expect("serialization should work"),
        )
        .await
        .expect("Write should succeed");
        tokio::fs::write(runs_dir.join("truncated.json"), "{\"id\": \"tr")
            .await
            .expect("Write should succeed");

        let updated = updater
            .update_run(
                "proj",
                &task.id,
                &stored.run.id,
                json!({"output": {"output": "new"}}),
            )
            .await
            .expect("Update should succeed");
        assert_eq!(updated.output.output, "new");

        let updated = updater
            .update_run("proj", &task.id, &sibling.id, json!({"tags": ["checked"]}))
            .await
            .expect("Update of a run with extra fields should succeed");
        assert_eq!(updated.tags, vec!["checked".to_string()]);
        assert_eq!(updated.output.output, "other text");
    }

    #[tokio::test]
    async fn test_misspelled_patch_field_rejected() {
        let (_dir, updater, task, stored) = setup().await;

        let result = updater
            .update_run(
                "proj",
                &task.id,
                &stored.run.id,
                json!({"output": {"outptu": "typo"}}),
            )
            .await;
        match result {
            Err(RunUpdateError::Validation(ValidationError::UnknownField(field))) => {
                assert_eq!(field, "output.outptu")
            }
            other => panic!("Expected UnknownField, got {:?}", other),
        }

        let reloaded = updater
            .store()
            .run("proj", &task.id, &stored.run.id)
            .await
            .expect("Load should succeed");
        assert_eq!(reloaded.run, stored.run);
    }
}
