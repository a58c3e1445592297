//! Domain records: tasks, their recorded runs, and dataset splits.
//!
//! These are owned by the task store; everything else in the crate reads them
//! and only [`crate::runs::RunUpdater`] writes runs back.

pub mod dataset;
pub mod run;
pub mod task;

pub use dataset::{DatasetSplit, FinetuneDataStrategy};
pub use run::{
    DataSource, DataSourceType, TaskOutput, TaskOutputRating, TaskRun, CHAIN_OF_THOUGHT_KEY,
    REASONING_KEY,
};
pub use task::{
    Task, TaskOutputRatingType, TaskRequirement, COT_FINAL_ANSWER_PROMPT,
    DEFAULT_THINKING_INSTRUCTION,
};
