//! Error types for tune-forge operations.
//!
//! Defines error types for each subsystem:
//! - Score schema compilation
//! - Task run validation
//! - Task/run/split storage
//! - Training data assembly and dataset export
//! - Concurrent run updates
//! - Configuration loading

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while compiling a grading score schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreSchemaError {
    #[error("Requirements '{first}' and '{second}' both map to schema property '{key}'")]
    DuplicatePropertyKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("Requirement name '{0}' does not produce a usable schema property key")]
    EmptyPropertyKey(String),
}

/// Errors raised when a task run document fails validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Run document does not match the run schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("Unknown field '{0}' in run document")]
    UnknownField(String),

    #[error("Run id must not be empty")]
    EmptyId,

    #[error("Run id cannot change during an update (was '{expected}', got '{actual}')")]
    IdChanged { expected: String, actual: String },

    #[error("Repaired output must not carry a rating")]
    RatedRepair,

    #[error("Rating value {value} is not valid for a {rating_type} rating")]
    InvalidRatingValue { rating_type: String, value: f64 },

    #[error("Requirement rating '{0}' must be a finite number")]
    InvalidRequirementRating(String),

    #[error("Data source of type '{source_type}' is missing required property '{property}'")]
    MissingSourceProperty {
        source_type: String,
        property: String,
    },

    #[error("Invalid tag '{0}': tags must be non-empty and contain no whitespace")]
    InvalidTag(String),
}

/// Errors that can occur in the task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Project not found. ID: {0}")]
    ProjectNotFound(String),

    #[error("Task not found. ID: {0}")]
    TaskNotFound(String),

    #[error("Run not found. ID: {0}")]
    RunNotFound(String),

    #[error("Dataset split not found. ID: {0}")]
    SplitNotFound(String),

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while turning a run into a training example.
#[derive(Debug, Error)]
pub enum TrainingDataError {
    #[error("Task run '{0}' needs a parent task to build chain of thought prompts. Train without chain of thought, or save this run to a parent task.")]
    MissingTaskContext(String),

    #[error("Invalid JSON in structured training output: {source}\nOutput Data: {output}")]
    MalformedPayload {
        output: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur during dataset export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Split '{0}' not found in dataset")]
    UnknownSplit(String),

    #[error("Task run {0} not found. This is required by this dataset.")]
    RunNotFound(String),

    #[error("Failed to build training data: {0}")]
    TrainingData(#[from] TrainingDataError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while applying a patch to a stored run.
#[derive(Debug, Error)]
pub enum RunUpdateError {
    #[error("Run patch must be a JSON object")]
    InvalidPatch,

    #[error("Merged run failed validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunUpdateError {
    /// True when the update failed because a project, task or run does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Store(
                StoreError::ProjectNotFound(_)
                    | StoreError::TaskNotFound(_)
                    | StoreError::RunNotFound(_)
            )
        )
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
