//! tune-forge: grading schemas and fine-tuning datasets from recorded task runs.
//!
//! This library turns a task definition and its recorded runs into two derived
//! artifacts: a JSON schema an automated grader fills in against the task's
//! rubric, and provider-specific JSONL training files (OpenAI, HuggingFace,
//! Vertex AI), optionally including the run's recorded reasoning. It also
//! provides serialized partial updates of stored runs.

pub mod cli;
pub mod config;
pub mod datamodel;
pub mod error;
pub mod eval;
pub mod export;
pub mod runs;
pub mod storage;
pub mod utils;

pub use config::ForgeConfig;
pub use error::{
    ConfigError, ExportError, RunUpdateError, ScoreSchemaError, StoreError, TrainingDataError,
    ValidationError,
};
