//! Dataset splits: named, ordered subsets of a task's runs frozen for fine-tuning.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A frozen partition of a task's runs, e.g. `train` / `val`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Split name to the ordered run ids it contains.
    pub split_contents: BTreeMap<String, Vec<String>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl DatasetSplit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.into(),
            description: None,
            split_contents: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds or replaces one named split.
    pub fn with_split(mut self, split_name: impl Into<String>, run_ids: Vec<String>) -> Self {
        self.split_contents.insert(split_name.into(), run_ids);
        self
    }

    /// Run ids of a named split, in export order.
    pub fn run_ids(&self, split_name: &str) -> Option<&[String]> {
        self.split_contents.get(split_name).map(Vec::as_slice)
    }
}

/// Which parts of a run go into training data.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinetuneDataStrategy {
    /// Only the final answer.
    #[default]
    FinalOnly,
    /// The final answer preceded by the recorded chain of thought.
    FinalAndIntermediate,
}

impl FinetuneDataStrategy {
    pub fn includes_cot(&self) -> bool {
        matches!(self, Self::FinalAndIntermediate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinalOnly => "final_only",
            Self::FinalAndIntermediate => "final_and_intermediate",
        }
    }
}

impl FromStr for FinetuneDataStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "final_only" => Ok(Self::FinalOnly),
            "final_and_intermediate" => Ok(Self::FinalAndIntermediate),
            other => Err(format!(
                "unknown data strategy '{other}' (expected final_only or final_and_intermediate)"
            )),
        }
    }
}
