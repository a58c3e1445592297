//! Storage interface for tasks, their runs and dataset splits.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::datamodel::{DatasetSplit, Task, TaskRun};
use crate::error::StoreError;

/// A run together with the location it is persisted at.
///
/// Updates are written back to `path`, so a run keeps its storage identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRun {
    pub path: PathBuf,
    pub run: TaskRun,
}

/// Read/write access to persisted tasks and runs.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Loads a task definition.
    async fn task(&self, project_id: &str, task_id: &str) -> Result<Task, StoreError>;

    /// Loads every run recorded for a task.
    async fn runs(&self, project_id: &str, task_id: &str) -> Result<Vec<StoredRun>, StoreError>;

    /// Loads a dataset split of a task.
    async fn dataset_split(
        &self,
        project_id: &str,
        task_id: &str,
        split_id: &str,
    ) -> Result<DatasetSplit, StoreError>;

    /// Persists a new run under a task and returns where it was written.
    async fn save_run(
        &self,
        project_id: &str,
        task_id: &str,
        run: &TaskRun,
    ) -> Result<StoredRun, StoreError>;

    /// Overwrites a previously loaded run at its original location.
    async fn write_run(&self, stored: &StoredRun) -> Result<(), StoreError>;

    /// Loads a single run by id.
    async fn run(
        &self,
        project_id: &str,
        task_id: &str,
        run_id: &str,
    ) -> Result<StoredRun, StoreError> {
        self.runs(project_id, task_id)
            .await?
            .into_iter()
            .find(|stored| stored.run.id == run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }
}
