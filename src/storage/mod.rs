//! Persistence of projects, tasks, runs and dataset splits.
//!
//! [`TaskStore`] is the seam the export and run-update paths go through;
//! [`FsTaskStore`] keeps everything as pretty-printed JSON under one directory.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tune_forge::storage::{FsTaskStore, TaskStore};
//!
//! let store = FsTaskStore::new("./projects");
//! store.create_project("support-bot").await?;
//! store.save_task("support-bot", &task).await?;
//! let stored = store.save_run("support-bot", &task.id, &run).await?;
//! let runs = store.runs("support-bot", &task.id).await?;
//! ```

mod fs_store;
mod task_store;

pub use fs_store::FsTaskStore;
pub use task_store::{StoredRun, TaskStore};
