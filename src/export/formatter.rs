//! Writes a dataset split as a JSONL training file.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tracing::{debug, info};

use super::formats::DatasetFormat;
use super::training_data::build_training_data;
use crate::datamodel::{DatasetSplit, FinetuneDataStrategy, Task, TaskRun};
use crate::error::{ExportError, StoreError};
use crate::storage::TaskStore;

/// Result of a dataset export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetExport {
    /// Path of the written JSONL file.
    pub path: PathBuf,
    /// Number of examples written.
    pub example_count: usize,
    pub format: DatasetFormat,
    pub include_cot: bool,
}

/// Formats the runs of a dataset split into provider training files.
///
/// # Example
///
/// ```ignore
/// use tune_forge::export::{DatasetFormat, DatasetFormatter};
/// use tune_forge::datamodel::FinetuneDataStrategy;
///
/// let formatter = DatasetFormatter::load(&store, "proj", "task", "split", "You are helpful.").await?;
/// let export = formatter.dump_to_file(
///     "train",
///     DatasetFormat::OpenaiChat,
///     FinetuneDataStrategy::FinalOnly,
///     None,
/// )?;
/// println!("Wrote {} examples to {}", export.example_count, export.path.display());
/// ```
pub struct DatasetFormatter {
    dataset: DatasetSplit,
    task: Task,
    runs: HashMap<String, TaskRun>,
    system_message: String,
    scratch_dir: PathBuf,
}

impl DatasetFormatter {
    /// Creates a formatter over a split and the runs it may reference.
    pub fn new(
        dataset: DatasetSplit,
        task: Task,
        runs: impl IntoIterator<Item = TaskRun>,
        system_message: impl Into<String>,
    ) -> Self {
        Self {
            dataset,
            task,
            runs: runs.into_iter().map(|run| (run.id.clone(), run)).collect(),
            system_message: system_message.into(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Loads the split, its task and every run the split references from a store.
    ///
    /// Only referenced runs are read, so unrelated run files cannot fail the
    /// load. A referenced run missing from the store is left out here and
    /// reported by `dump_to_file` for the split that needs it.
    pub async fn load<S: TaskStore + ?Sized>(
        store: &S,
        project_id: &str,
        task_id: &str,
        split_id: &str,
        system_message: impl Into<String>,
    ) -> Result<Self, ExportError> {
        let task = store.task(project_id, task_id).await?;
        let dataset = store.dataset_split(project_id, task_id, split_id).await?;

        let run_ids: BTreeSet<&str> = dataset
            .split_contents
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        debug!(dataset = %dataset.id, runs = run_ids.len(), "Loading referenced runs");

        let lookups = run_ids.into_iter().map(|run_id| async move {
            match store.run(project_id, task_id, run_id).await {
                Ok(stored) => Ok(Some(stored.run)),
                Err(StoreError::RunNotFound(_)) => Ok(None),
                Err(e) => Err(e),
            }
        });
        let runs: Vec<TaskRun> = try_join_all(lookups).await?.into_iter().flatten().collect();

        Ok(Self::new(dataset, task, runs, system_message))
    }

    /// Directory used when no explicit output path is given. Defaults to the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// The task the split belongs to.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Deterministic file name for an export without an explicit path.
    ///
    /// Path separators in the dataset and split names become `_`, so the
    /// name always stays inside the scratch directory.
    pub fn default_file_name(
        &self,
        split_name: &str,
        format: DatasetFormat,
        include_cot: bool,
    ) -> String {
        format!(
            "{}--split-{}--format-{}--{}.jsonl",
            file_name_part(&self.dataset.name),
            file_name_part(split_name),
            format.as_str(),
            if include_cot { "cot" } else { "no-cot" }
        )
    }

    /// Writes one training example per run of `split_name`, in split order.
    ///
    /// Every run id is resolved before the output file is created, so an
    /// unknown split or a missing run fails without writing anything. A
    /// failure while encoding a run leaves a partial file behind.
    ///
    /// Concurrent exports to the same path are not coordinated and may
    /// corrupt each other.
    pub fn dump_to_file(
        &self,
        split_name: &str,
        format: DatasetFormat,
        strategy: FinetuneDataStrategy,
        path: Option<&Path>,
    ) -> Result<DatasetExport, ExportError> {
        let run_ids = self
            .dataset
            .run_ids(split_name)
            .ok_or_else(|| ExportError::UnknownSplit(split_name.to_string()))?;

        let runs = run_ids
            .iter()
            .map(|id| {
                self.runs
                    .get(id)
                    .ok_or_else(|| ExportError::RunNotFound(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let include_cot = strategy.includes_cot();
        let output_path = match path {
            Some(path) => path.to_path_buf(),
            None => self
                .scratch_dir
                .join(self.default_file_name(split_name, format, include_cot)),
        };

        info!(
            dataset = %self.dataset.name,
            split = split_name,
            format = %format,
            include_cot,
            runs = runs.len(),
            path = %output_path.display(),
            "Exporting dataset split"
        );

        let file = File::create(&output_path)?;
        let mut writer = BufWriter::new(file);

        for run in &runs {
            let training_data =
                build_training_data(run, Some(&self.task), &self.system_message, include_cot)?;
            let example = format.generate(&training_data)?;
            let json_line = serde_json::to_string(&example)?;
            writeln!(writer, "{}", json_line)?;
        }

        writer.flush()?;

        Ok(DatasetExport {
            path: output_path,
            example_count: runs.len(),
            format,
            include_cot,
        })
    }
}

fn file_name_part(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}
