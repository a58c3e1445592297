//! Task run records: one recorded execution of a task with its output and ratings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskOutputRatingType;
use crate::error::ValidationError;

/// Intermediate output key holding model reasoning.
pub const REASONING_KEY: &str = "reasoning";

/// Intermediate output key holding a chain of thought, used when no reasoning is recorded.
pub const CHAIN_OF_THOUGHT_KEY: &str = "chain_of_thought";

/// Who or what produced a piece of data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceType {
    Human,
    Synthetic,
}

impl DataSourceType {
    fn required_properties(&self) -> &'static [&'static str] {
        match self {
            Self::Human => &["created_by"],
            Self::Synthetic => &["model_name", "model_provider"],
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Synthetic => "synthetic",
        }
    }
}

/// Provenance of an input or output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSource {
    #[serde(rename = "type")]
    pub source_type: DataSourceType,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl DataSource {
    pub fn human(created_by: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            "created_by".to_string(),
            serde_json::Value::String(created_by.into()),
        );
        Self {
            source_type: DataSourceType::Human,
            properties,
        }
    }

    pub fn synthetic(model_name: impl Into<String>, model_provider: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            "model_name".to_string(),
            serde_json::Value::String(model_name.into()),
        );
        properties.insert(
            "model_provider".to_string(),
            serde_json::Value::String(model_provider.into()),
        );
        Self {
            source_type: DataSourceType::Synthetic,
            properties,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for property in self.source_type.required_properties() {
            if !self.properties.contains_key(*property) {
                return Err(ValidationError::MissingSourceProperty {
                    source_type: self.source_type.as_str().to_string(),
                    property: property.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A rating attached to a task output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutputRating {
    #[serde(rename = "type", default = "default_rating_type")]
    pub rating_type: TaskOutputRatingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Per-requirement scores keyed by requirement name.
    #[serde(default)]
    pub requirement_ratings: BTreeMap<String, f64>,
}

fn default_rating_type() -> TaskOutputRatingType {
    TaskOutputRatingType::FiveStar
}

impl TaskOutputRating {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(value) = self.value {
            if !self.rating_type.accepts(value) {
                return Err(ValidationError::InvalidRatingValue {
                    rating_type: self.rating_type.to_string(),
                    value,
                });
            }
        }
        for (name, value) in &self.requirement_ratings {
            if !value.is_finite() {
                return Err(ValidationError::InvalidRequirementRating(name.clone()));
            }
        }
        Ok(())
    }
}

/// Output text of a run together with its provenance and rating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutput {
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<TaskOutputRating>,
}

impl TaskOutput {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            source: None,
            rating: None,
        }
    }

    pub fn with_source(mut self, source: DataSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_rating(mut self, rating_type: TaskOutputRatingType, value: f64) -> Self {
        self.rating = Some(TaskOutputRating {
            rating_type,
            value: Some(value),
            requirement_ratings: BTreeMap::new(),
        });
        self
    }
}

/// One recorded execution of a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRun {
    pub id: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_source: Option<DataSource>,
    pub output: TaskOutput,
    /// Human correction of `output`. Always preferred for training.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repaired_output: Option<TaskOutput>,
    /// Named intermediate outputs, e.g. `reasoning` or `chain_of_thought`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_outputs: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TaskRun {
    /// Creates a run with a fresh id.
    pub fn new(input: impl Into<String>, output: TaskOutput) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            input: input.into(),
            input_source: None,
            output,
            repaired_output: None,
            intermediate_outputs: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_repaired_output(mut self, repaired: TaskOutput) -> Self {
        self.repaired_output = Some(repaired);
        self
    }

    pub fn with_intermediate_output(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.intermediate_outputs
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Best available output: the human repair when present, the original otherwise.
    pub fn final_output(&self) -> &str {
        match &self.repaired_output {
            Some(repaired) => &repaired.output,
            None => &self.output.output,
        }
    }

    /// Recorded reasoning, preferring `reasoning` over `chain_of_thought`.
    pub fn thinking(&self) -> Option<&str> {
        let outputs = self.intermediate_outputs.as_ref()?;
        outputs
            .get(REASONING_KEY)
            .or_else(|| outputs.get(CHAIN_OF_THOUGHT_KEY))
            .map(String::as_str)
    }

    /// Decodes and validates a run from a raw JSON document.
    ///
    /// Stricter than plain deserialization: any non-null field the run model
    /// does not know is rejected, so a misspelled key in an update fails
    /// instead of being dropped.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        let run: TaskRun = serde_json::from_value(value.clone())?;
        let known = serde_json::to_value(&run)?;
        if let Some(field) = first_unknown_field(&value, &known, "") {
            return Err(ValidationError::UnknownField(field));
        }
        run.validate()?;
        Ok(run)
    }

    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }

        if let Some(source) = &self.input_source {
            source.validate()?;
        }
        if let Some(source) = &self.output.source {
            source.validate()?;
        }
        if let Some(rating) = &self.output.rating {
            rating.validate()?;
        }

        if let Some(repaired) = &self.repaired_output {
            if repaired.rating.is_some() {
                return Err(ValidationError::RatedRepair);
            }
            if let Some(source) = &repaired.source {
                source.validate()?;
            }
        }

        for tag in &self.tags {
            if tag.is_empty() || tag.chars().any(char::is_whitespace) {
                return Err(ValidationError::InvalidTag(tag.clone()));
            }
        }

        Ok(())
    }
}

/// Dotted path of the first non-null key in `document` that is missing from
/// `known`, the re-serialized decode of the same document.
fn first_unknown_field(
    document: &serde_json::Value,
    known: &serde_json::Value,
    prefix: &str,
) -> Option<String> {
    let (serde_json::Value::Object(document), serde_json::Value::Object(known)) =
        (document, known)
    else {
        return None;
    };

    for (key, value) in document {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match known.get(key) {
            Some(known_value) => {
                if let Some(found) = first_unknown_field(value, known_value, &path) {
                    return Some(found);
                }
            }
            None if value.is_null() => {}
            None => return Some(path),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_run() -> TaskRun {
        TaskRun::new("What is 2+2?", TaskOutput::new("4"))
    }

    #[test]
    fn test_final_output_prefers_repair() {
        let run = sample_run();
        assert_eq!(run.final_output(), "4");

        let run = run.with_repaired_output(TaskOutput::new("four"));
        assert_eq!(run.final_output(), "four");
    }

    #[test]
    fn test_thinking_prefers_reasoning() {
        let run = sample_run()
            .with_intermediate_output(CHAIN_OF_THOUGHT_KEY, "cot")
            .with_intermediate_output(REASONING_KEY, "reasoning");
        assert_eq!(run.thinking(), Some("reasoning"));

        let run = sample_run().with_intermediate_output(CHAIN_OF_THOUGHT_KEY, "cot");
        assert_eq!(run.thinking(), Some("cot"));

        let run = sample_run().with_intermediate_output("notes", "n");
        assert_eq!(run.thinking(), None);
        assert_eq!(sample_run().thinking(), None);
    }

    #[test]
    fn test_validate_accepts_well_formed_run() {
        let mut run = sample_run()
            .with_intermediate_output(REASONING_KEY, "adding")
            .with_repaired_output(TaskOutput::new("four").with_source(DataSource::human("jo")));
        run.output = TaskOutput::new("4")
            .with_source(DataSource::synthetic("gpt-4o", "openai"))
            .with_rating(TaskOutputRatingType::FiveStar, 4.0);
        run.tags = vec!["golden".to_string()];
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_rated_repair() {
        let run = sample_run().with_repaired_output(
            TaskOutput::new("four").with_rating(TaskOutputRatingType::PassFail, 1.0),
        );
        assert!(matches!(run.validate(), Err(ValidationError::RatedRepair)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_rating() {
        let mut run = sample_run();
        run.output = TaskOutput::new("4").with_rating(TaskOutputRatingType::FiveStar, 7.0);
        assert!(matches!(
            run.validate(),
            Err(ValidationError::InvalidRatingValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_incomplete_source() {
        let mut run = sample_run();
        run.output = TaskOutput::new("4").with_source(DataSource {
            source_type: DataSourceType::Synthetic,
            properties: BTreeMap::new(),
        });
        match run.validate() {
            Err(ValidationError::MissingSourceProperty { property, .. }) => {
                assert_eq!(property, "model_name")
            }
            other => panic!("Expected MissingSourceProperty, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_tags() {
        let mut run = sample_run();
        run.tags = vec!["two words".to_string()];
        assert!(matches!(run.validate(), Err(ValidationError::InvalidTag(_))));
    }

    #[test]
    fn test_from_value_rejects_unknown_fields() {
        let doc = json!({
            "id": "r1",
            "input": "hi",
            "output": {"output": "hello", "outptu": "typo"},
        });
        match TaskRun::from_value(doc) {
            Err(ValidationError::UnknownField(field)) => assert_eq!(field, "output.outptu"),
            other => panic!("Expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_from_value_accepts_null_optionals() {
        let doc = json!({
            "id": "r1",
            "input": "hi",
            "output": {"output": "hello", "rating": null},
            "repaired_output": null,
            "intermediate_outputs": {"reasoning": "because"},
        });
        let run = TaskRun::from_value(doc).expect("should decode");
        assert!(run.repaired_output.is_none());
        assert_eq!(run.thinking(), Some("because"));
    }

    #[test]
    fn test_plain_decode_tolerates_extra_fields() {
        let doc = json!({
            "id": "r1",
            "model_type": "task_run",
            "input": "hi",
            "output": {"output": "hello"},
        });
        let run: TaskRun = serde_json::from_value(doc).expect("should decode");
        assert_eq!(run.id, "r1");
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        let doc = json!({"id": "r1", "input": 5, "output": {"output": "hello"}});
        assert!(TaskRun::from_value(doc).is_err());
    }

    #[test]
    fn test_serialization_omits_absent_optionals() {
        let run = sample_run();
        let value = serde_json::to_value(&run).expect("serialization should work");
        assert!(value.get("repaired_output").is_none());
        assert!(value.get("intermediate_outputs").is_none());
        assert_eq!(value["output"]["output"], "4");
    }
}
