//! Compiles a task's rubric into the JSON Schema a grader must answer with.
//!
//! Every scored requirement becomes one property, in rubric order, followed by
//! a trailing `overall_rating`. Custom requirements are not graded and are
//! left out of the schema.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::datamodel::{Task, TaskOutputRatingType, TaskRequirement};
use crate::error::ScoreSchemaError;

/// Property key of the rating every schema ends with.
pub const OVERALL_RATING_KEY: &str = "overall_rating";

const OVERALL_RATING_TITLE: &str = "Overall Rating";
const OVERALL_RATING_INSTRUCTION: &str = "The overall rating for the task output";

const FIVE_STAR_CLAUSE: &str =
    "The rating should be between 1 and 5, with 1 being the worst and 5 being the best.";
const PASS_FAIL_CLAUSE: &str = "The rating should be either 'pass' or 'fail'.";
const PASS_FAIL_FLOAT_CLAUSE: &str =
    "The rating should be between 0 and 1, with 0 being a failure and 1 being a pass.";
const PASS_FAIL_CRITICAL_CLAUSE: &str =
    "The rating should be either 'pass', 'fail', or 'critical' where critical a very severe failure.";
const PASS_FAIL_CRITICAL_FLOAT_CLAUSE: &str = "The rating should be between -1 and 1, with 1 being a pass, 0 being a failure, and -1 being a critical failure (a very severe failure).";

/// How a rating's value is constrained in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingEncoding {
    /// Integer drawn from a fixed set.
    IntegerEnum(&'static [i64]),
    /// String drawn from a fixed set.
    StringEnum(&'static [&'static str]),
    /// Any number in a closed range.
    NumberRange { minimum: i64, maximum: i64 },
}

/// Schema fragment for one rating kind: its value constraint and the range
/// sentence appended to the rubric text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingFragment {
    pub encoding: RatingEncoding,
    pub range_clause: &'static str,
}

impl RatingFragment {
    /// Renders the fragment as a schema property.
    pub fn to_property(&self, title: &str, instruction: &str) -> Value {
        let mut property = Map::new();
        property.insert("title".to_string(), json!(title));
        property.insert(
            "description".to_string(),
            json!(format!("{}\n\n{}", instruction, self.range_clause)),
        );
        match self.encoding {
            RatingEncoding::IntegerEnum(values) => {
                property.insert("type".to_string(), json!("integer"));
                property.insert("enum".to_string(), json!(values));
            }
            RatingEncoding::StringEnum(values) => {
                property.insert("type".to_string(), json!("string"));
                property.insert("enum".to_string(), json!(values));
            }
            RatingEncoding::NumberRange { minimum, maximum } => {
                property.insert("type".to_string(), json!("number"));
                property.insert("minimum".to_string(), json!(minimum));
                property.insert("maximum".to_string(), json!(maximum));
            }
        }
        Value::Object(property)
    }
}

/// Maps a rating kind to its schema fragment. `None` for kinds that are never graded.
pub fn rating_fragment(
    rating_type: TaskOutputRatingType,
    allow_float_scores: bool,
) -> Option<RatingFragment> {
    let fragment = match (rating_type, allow_float_scores) {
        (TaskOutputRatingType::FiveStar, false) => RatingFragment {
            encoding: RatingEncoding::IntegerEnum(&[1, 2, 3, 4, 5]),
            range_clause: FIVE_STAR_CLAUSE,
        },
        (TaskOutputRatingType::FiveStar, true) => RatingFragment {
            encoding: RatingEncoding::NumberRange {
                minimum: 1,
                maximum: 5,
            },
            range_clause: FIVE_STAR_CLAUSE,
        },
        (TaskOutputRatingType::PassFail, false) => RatingFragment {
            encoding: RatingEncoding::StringEnum(&["pass", "fail"]),
            range_clause: PASS_FAIL_CLAUSE,
        },
        (TaskOutputRatingType::PassFail, true) => RatingFragment {
            encoding: RatingEncoding::NumberRange {
                minimum: 0,
                maximum: 1,
            },
            range_clause: PASS_FAIL_FLOAT_CLAUSE,
        },
        (TaskOutputRatingType::PassFailCritical, false) => RatingFragment {
            encoding: RatingEncoding::StringEnum(&["pass", "fail", "critical"]),
            range_clause: PASS_FAIL_CRITICAL_CLAUSE,
        },
        (TaskOutputRatingType::PassFailCritical, true) => RatingFragment {
            encoding: RatingEncoding::NumberRange {
                minimum: -1,
                maximum: 1,
            },
            range_clause: PASS_FAIL_CRITICAL_FLOAT_CLAUSE,
        },
        (TaskOutputRatingType::Custom, _) => return None,
    };
    Some(fragment)
}

/// Schema property key for a requirement name: lower-cased, each whitespace char as `_`.
///
/// Names are not trimmed, so `" Quality"` maps to `_quality` and does not
/// collide with `"Quality"`.
pub fn property_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Builds the score schema for `requirements` as a JSON value.
///
/// Fails if two scored requirements share a property key, or one collides
/// with `overall_rating`.
pub fn score_schema(
    requirements: &[TaskRequirement],
    allow_float_scores: bool,
) -> Result<Value, ScoreSchemaError> {
    let mut properties = Map::new();
    let mut owners: HashMap<String, &str> = HashMap::new();
    owners.insert(OVERALL_RATING_KEY.to_string(), OVERALL_RATING_TITLE);

    for requirement in requirements {
        let Some(fragment) = rating_fragment(requirement.rating_type, allow_float_scores) else {
            continue;
        };

        if requirement.name.trim().is_empty() {
            return Err(ScoreSchemaError::EmptyPropertyKey(requirement.name.clone()));
        }
        let key = property_key(&requirement.name);
        if let Some(first) = owners.get(&key) {
            return Err(ScoreSchemaError::DuplicatePropertyKey {
                key,
                first: first.to_string(),
                second: requirement.name.clone(),
            });
        }
        owners.insert(key.clone(), &requirement.name);

        properties.insert(
            key,
            fragment.to_property(&requirement.name, &requirement.instruction),
        );
    }

    // overall_rating always uses the five star rule
    if let Some(overall) = rating_fragment(TaskOutputRatingType::FiveStar, allow_float_scores) {
        properties.insert(
            OVERALL_RATING_KEY.to_string(),
            overall.to_property(OVERALL_RATING_TITLE, OVERALL_RATING_INSTRUCTION),
        );
    }

    let required: Vec<Value> = properties.keys().map(|k| json!(k)).collect();

    Ok(json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    }))
}

/// Builds the score schema for a task and serializes it as compact JSON text.
pub fn build_score_schema(task: &Task, allow_float_scores: bool) -> Result<String, ScoreSchemaError> {
    let schema = score_schema(&task.requirements, allow_float_scores)?;
    tracing::debug!(
        task_id = %task.id,
        properties = schema["properties"].as_object().map_or(0, Map::len),
        allow_float_scores,
        "Built score schema"
    );
    Ok(schema.to_string())
}
