//! Task definitions and their rating requirements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default chain of thought instruction used when a task does not define its own.
pub const DEFAULT_THINKING_INSTRUCTION: &str = "Think step by step, explaining your reasoning.";

/// Prompt asking the model for its final answer after a thinking turn.
///
/// Shared by every task so training data and inference use the same wording.
pub const COT_FINAL_ANSWER_PROMPT: &str = "Considering the above, return a final result.";

/// Scoring scheme for one rubric requirement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutputRatingType {
    /// 1 to 5 stars.
    FiveStar,
    /// Pass or fail.
    PassFail,
    /// Pass, fail, or critical failure.
    PassFailCritical,
    /// Unscored, free-form rating. Never graded automatically.
    Custom,
}

impl TaskOutputRatingType {
    /// Wire name of the rating type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiveStar => "five_star",
            Self::PassFail => "pass_fail",
            Self::PassFailCritical => "pass_fail_critical",
            Self::Custom => "custom",
        }
    }

    /// Whether `value` is a legal stored rating for this type.
    pub fn accepts(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            Self::FiveStar => value.fract() == 0.0 && (1.0..=5.0).contains(&value),
            Self::PassFail => value == 0.0 || value == 1.0,
            Self::PassFailCritical => value == -1.0 || value == 0.0 || value == 1.0,
            Self::Custom => true,
        }
    }
}

impl std::fmt::Display for TaskOutputRatingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rubric requirement a task output is graded against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRequirement {
    /// Display name, also the source of the schema property key.
    pub name: String,
    /// Rubric text shown to the grader.
    pub instruction: String,
    /// How this requirement is scored.
    #[serde(rename = "type")]
    pub rating_type: TaskOutputRatingType,
}

impl TaskRequirement {
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        rating_type: TaskOutputRatingType,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            rating_type,
        }
    }
}

/// A task definition: the instruction given to a model plus its grading rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub instruction: String,
    /// Ordered rubric. Order is preserved into the score schema.
    #[serde(default)]
    pub requirements: Vec<TaskRequirement>,
    /// Custom chain of thought instruction for this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_instruction: Option<String>,
    /// JSON schema for structured outputs, when the task produces JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_json_schema: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task with a fresh id and no requirements.
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.into(),
            description: None,
            instruction: instruction.into(),
            requirements: Vec::new(),
            thinking_instruction: None,
            output_json_schema: None,
            created_at: Utc::now(),
        }
    }

    /// Appends a rubric requirement.
    pub fn with_requirement(mut self, requirement: TaskRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Sets the task's own chain of thought instruction.
    pub fn with_thinking_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.thinking_instruction = Some(instruction.into());
        self
    }

    /// Instruction for the thinking turn of a chain of thought exchange.
    pub fn chain_of_thought_prompt(&self) -> String {
        match self.thinking_instruction.as_deref().map(str::trim) {
            Some(custom) if !custom.is_empty() => custom.to_string(),
            _ => DEFAULT_THINKING_INSTRUCTION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_type_wire_names() {
        let json = serde_json::to_string(&TaskOutputRatingType::PassFailCritical)
            .expect("serialization should work");
        assert_eq!(json, "\"pass_fail_critical\"");

        let parsed: TaskOutputRatingType =
            serde_json::from_str("\"five_star\"").expect("should parse");
        assert_eq!(parsed, TaskOutputRatingType::FiveStar);
    }

    #[test]
    fn test_rating_type_accepts() {
        assert!(TaskOutputRatingType::FiveStar.accepts(3.0));
        assert!(!TaskOutputRatingType::FiveStar.accepts(3.5));
        assert!(!TaskOutputRatingType::FiveStar.accepts(0.0));
        assert!(TaskOutputRatingType::PassFail.accepts(1.0));
        assert!(!TaskOutputRatingType::PassFail.accepts(-1.0));
        assert!(TaskOutputRatingType::PassFailCritical.accepts(-1.0));
        assert!(TaskOutputRatingType::Custom.accepts(42.5));
        assert!(!TaskOutputRatingType::Custom.accepts(f64::NAN));
    }

    #[test]
    fn test_requirement_type_field_name() {
        let req = TaskRequirement::new("Tone", "Be polite", TaskOutputRatingType::PassFail);
        let value = serde_json::to_value(&req).expect("serialization should work");
        assert_eq!(value["type"], "pass_fail");
    }

    #[test]
    fn test_chain_of_thought_prompt_default_and_custom() {
        let task = Task::new("Summarize", "Summarize the text");
        assert_eq!(task.chain_of_thought_prompt(), DEFAULT_THINKING_INSTRUCTION);

        let task = task.with_thinking_instruction("List the key points first.");
        assert_eq!(task.chain_of_thought_prompt(), "List the key points first.");

        let task = Task::new("Summarize", "Summarize the text").with_thinking_instruction("   ");
        assert_eq!(task.chain_of_thought_prompt(), DEFAULT_THINKING_INSTRUCTION);
    }
}
