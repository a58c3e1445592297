//! Fine-tuning dataset export.
//!
//! Turns the runs of a dataset split into JSONL training files for OpenAI,
//! HuggingFace and Vertex AI, optionally including recorded chain of thought.

pub mod formats;
pub mod formatter;
pub mod training_data;

pub use formats::{DatasetFormat, OPENAI_TOOL_CALL_ID, TASK_RESPONSE_TOOL};
pub use formatter::{DatasetExport, DatasetFormatter};
pub use training_data::{build_training_data, ModelTrainingData, ThinkingTurns};
