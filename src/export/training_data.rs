//! Normalizes a task run into the provider-neutral shape every export format consumes.

use crate::datamodel::{Task, TaskRun, COT_FINAL_ANSWER_PROMPT};
use crate::error::TrainingDataError;

/// The three synthetic turns inserted between the input and the final answer
/// when a run's reasoning is included in training data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingTurns {
    /// User turn asking the model to think.
    pub instructions: String,
    /// Assistant turn holding the recorded reasoning.
    pub thinking: String,
    /// User turn asking for the final answer.
    pub final_answer_prompt: String,
}

/// One training example before it is shaped for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTrainingData {
    pub input: String,
    pub system_message: String,
    pub final_output: String,
    /// Present only when chain of thought was requested and recorded.
    pub thinking: Option<ThinkingTurns>,
}

impl ModelTrainingData {
    pub fn new(
        input: impl Into<String>,
        system_message: impl Into<String>,
        final_output: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            system_message: system_message.into(),
            final_output: final_output.into(),
            thinking: None,
        }
    }

    pub fn with_thinking(mut self, thinking: ThinkingTurns) -> Self {
        self.thinking = Some(thinking);
        self
    }

    pub fn supports_cot(&self) -> bool {
        self.thinking.is_some()
    }
}

/// Builds training data for one run.
///
/// The final output is the human repair when one exists. Thinking turns are
/// added only when `include_cot` is set and the run recorded `reasoning` or
/// `chain_of_thought`; building them needs the run's parent task.
pub fn build_training_data(
    run: &TaskRun,
    task: Option<&Task>,
    system_message: &str,
    include_cot: bool,
) -> Result<ModelTrainingData, TrainingDataError> {
    let mut data = ModelTrainingData::new(&run.input, system_message, run.final_output());

    if !include_cot {
        return Ok(data);
    }
    let Some(thinking) = run.thinking() else {
        return Ok(data);
    };
    let Some(task) = task else {
        return Err(TrainingDataError::MissingTaskContext(run.id.clone()));
    };

    data.thinking = Some(ThinkingTurns {
        instructions: task.chain_of_thought_prompt(),
        thinking: thinking.to_string(),
        final_answer_prompt: COT_FINAL_ANSWER_PROMPT.to_string(),
    });
    Ok(data)
}
