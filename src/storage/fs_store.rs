//! File-based task store.
//!
//! Every entity is a pretty-printed JSON file:
//!
//! ```text
//! <base>/<project_id>/tasks/<task_id>/task.json
//! <base>/<project_id>/tasks/<task_id>/runs/*.json
//! <base>/<project_id>/tasks/<task_id>/splits/<split_id>.json
//! ```
//!
//! Run files may have any name; the id inside the document is authoritative.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::task_store::{StoredRun, TaskStore};
use crate::datamodel::{DatasetSplit, Task, TaskRun};
use crate::error::StoreError;

const TASK_FILE: &str = "task.json";
const RUNS_DIR: &str = "runs";
const SPLITS_DIR: &str = "splits";

/// Task store backed by a directory tree of JSON files.
#[derive(Debug, Clone)]
pub struct FsTaskStore {
    base_path: PathBuf,
}

impl FsTaskStore {
    /// Creates a store rooted at `base_path`. Nothing is touched until first use.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Returns the base storage path.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.base_path.join(project_id)
    }

    fn task_dir(&self, project_id: &str, task_id: &str) -> PathBuf {
        self.project_dir(project_id).join("tasks").join(task_id)
    }

    /// Creates an empty project directory.
    pub async fn create_project(&self, project_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.project_dir(project_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Writes a task definition, creating its directory if needed.
    pub async fn save_task(&self, project_id: &str, task: &Task) -> Result<PathBuf, StoreError> {
        self.existing_project(project_id).await?;
        let path = self.task_dir(project_id, &task.id).join(TASK_FILE);
        write_json(&path, task).await?;
        Ok(path)
    }

    /// Writes a dataset split under its task.
    pub async fn save_dataset_split(
        &self,
        project_id: &str,
        task_id: &str,
        split: &DatasetSplit,
    ) -> Result<PathBuf, StoreError> {
        let task_dir = self.existing_task(project_id, task_id).await?;
        let path = task_dir.join(SPLITS_DIR).join(format!("{}.json", split.id));
        write_json(&path, split).await?;
        Ok(path)
    }

    async fn existing_project(&self, project_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.project_dir(project_id);
        if !fs::try_exists(&dir).await? {
            return Err(StoreError::ProjectNotFound(project_id.to_string()));
        }
        Ok(dir)
    }

    async fn existing_task(&self, project_id: &str, task_id: &str) -> Result<PathBuf, StoreError> {
        self.existing_project(project_id).await?;
        let dir = self.task_dir(project_id, task_id);
        if !fs::try_exists(dir.join(TASK_FILE)).await? {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(dir)
    }
}

#[async_trait]
impl TaskStore for FsTaskStore {
    async fn task(&self, project_id: &str, task_id: &str) -> Result<Task, StoreError> {
        let dir = self.existing_task(project_id, task_id).await?;
        read_json(&dir.join(TASK_FILE)).await
    }

    async fn runs(&self, project_id: &str, task_id: &str) -> Result<Vec<StoredRun>, StoreError> {
        let runs_dir = self.existing_task(project_id, task_id).await?.join(RUNS_DIR);
        let paths = json_files(&runs_dir).await?;

        let mut runs = try_join_all(paths.into_iter().map(|path| async move {
            let run: TaskRun = read_json(&path).await?;
            Ok::<_, StoreError>(StoredRun { path, run })
        }))
        .await?;
        runs.sort_by(|a, b| a.run.id.cmp(&b.run.id));

        debug!(project_id, task_id, count = runs.len(), "Loaded task runs");
        Ok(runs)
    }

    /// Reads `runs/<run_id>.json` directly. Runs saved under other file names
    /// are found by scanning, decoding only the file whose `id` matches;
    /// unreadable sibling files are skipped.
    async fn run(
        &self,
        project_id: &str,
        task_id: &str,
        run_id: &str,
    ) -> Result<StoredRun, StoreError> {
        let runs_dir = self.existing_task(project_id, task_id).await?.join(RUNS_DIR);

        let direct = (!run_id.contains(['/', '\\']))
            .then(|| runs_dir.join(format!("{run_id}.json")));
        if let Some(path) = &direct {
            if fs::try_exists(path).await? {
                let run: TaskRun = read_json(path).await?;
                if run.id == run_id {
                    return Ok(StoredRun {
                        path: path.clone(),
                        run,
                    });
                }
            }
        }

        for path in json_files(&runs_dir).await? {
            if direct.as_ref() == Some(&path) {
                continue;
            }
            let contents = fs::read_to_string(&path).await?;
            let document: Value = match serde_json::from_str(&contents) {
                Ok(document) => document,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable run file");
                    continue;
                }
            };
            if document.get("id").and_then(Value::as_str) == Some(run_id) {
                let run: TaskRun =
                    serde_json::from_value(document).map_err(|source| StoreError::Decode {
                        path: path.clone(),
                        source,
                    })?;
                return Ok(StoredRun { path, run });
            }
        }

        Err(StoreError::RunNotFound(run_id.to_string()))
    }

    async fn dataset_split(
        &self,
        project_id: &str,
        task_id: &str,
        split_id: &str,
    ) -> Result<DatasetSplit, StoreError> {
        let path = self
            .existing_task(project_id, task_id)
            .await?
            .join(SPLITS_DIR)
            .join(format!("{split_id}.json"));
        if !fs::try_exists(&path).await? {
            return Err(StoreError::SplitNotFound(split_id.to_string()));
        }
        read_json(&path).await
    }

    async fn save_run(
        &self,
        project_id: &str,
        task_id: &str,
        run: &TaskRun,
    ) -> Result<StoredRun, StoreError> {
        let path = self
            .existing_task(project_id, task_id)
            .await?
            .join(RUNS_DIR)
            .join(format!("{}.json", run.id));
        write_json(&path, run).await?;
        Ok(StoredRun {
            path,
            run: run.clone(),
        })
    }

    async fn write_run(&self, stored: &StoredRun) -> Result<(), StoreError> {
        if !fs::try_exists(&stored.path).await? {
            return Err(StoreError::RunNotFound(stored.run.id.clone()));
        }
        write_json(&stored.path, &stored.run).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = fs::read_to_string(path).await?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Lists the `.json` files of a directory. A missing directory has none.
async fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut paths = Vec::new();
    if !fs::try_exists(dir).await? {
        return Ok(paths);
    }
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Writes pretty JSON to a temp file next to `path`, then renames it over
/// `path`. Readers see either the old document or the new one.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    fs::create_dir_all(parent).await?;

    // Pretty JSON for readability
    let json = serde_json::to_string_pretty(value)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");
    let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    let written = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}
