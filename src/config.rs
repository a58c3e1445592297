//! Configuration for exports and schema generation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::datamodel::FinetuneDataStrategy;
use crate::error::ConfigError;
use crate::export::DatasetFormat;

/// Default directory holding project data.
pub const DEFAULT_PROJECTS_DIR: &str = "./projects";

/// Settings shared by the CLI commands, loadable from a YAML file.
///
/// ```yaml
/// projects_dir: ./projects
/// system_message: You are a helpful support agent.
/// format: openai_chat_toolcall_jsonl
/// data_strategy: final_and_intermediate
/// allow_float_scores: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Root of the task store.
    pub projects_dir: PathBuf,
    /// System message written into training examples. Falls back to the task instruction.
    pub system_message: Option<String>,
    /// Default export format.
    pub format: DatasetFormat,
    /// Default fine-tune data strategy.
    pub data_strategy: FinetuneDataStrategy,
    /// Emit continuous ranges instead of discrete enums in score schemas.
    pub allow_float_scores: bool,
    /// Directory for exports written without an explicit path. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            projects_dir: PathBuf::from(DEFAULT_PROJECTS_DIR),
            system_message: None,
            format: DatasetFormat::OpenaiChat,
            data_strategy: FinetuneDataStrategy::default(),
            allow_float_scores: false,
            scratch_dir: None,
        }
    }
}

impl ForgeConfig {
    /// Loads configuration from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_projects_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.projects_dir = dir.into();
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn with_format(mut self, format: DatasetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_data_strategy(mut self, strategy: FinetuneDataStrategy) -> Self {
        self.data_strategy = strategy;
        self
    }

    pub fn with_float_scores(mut self, allow: bool) -> Self {
        self.allow_float_scores = allow;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// System message for a task: the configured one, else the task's instruction.
    pub fn system_message_for<'a>(&'a self, task_instruction: &'a str) -> &'a str {
        self.system_message.as_deref().unwrap_or(task_instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.projects_dir, PathBuf::from(DEFAULT_PROJECTS_DIR));
        assert_eq!(config.format, DatasetFormat::OpenaiChat);
        assert_eq!(config.data_strategy, FinetuneDataStrategy::FinalOnly);
        assert!(!config.allow_float_scores);
        assert!(config.scratch_dir.is_none());
    }

    #[test]
    fn test_builder() {
        let config = ForgeConfig::default()
            .with_projects_dir("/data")
            .with_system_message("Be brief.")
            .with_format(DatasetFormat::VertexGemini15)
            .with_data_strategy(FinetuneDataStrategy::FinalAndIntermediate)
            .with_float_scores(true)
            .with_scratch_dir("/tmp/exports");
        assert_eq!(config.projects_dir, PathBuf::from("/data"));
        assert_eq!(config.system_message_for("ignored"), "Be brief.");
        assert_eq!(config.format, DatasetFormat::VertexGemini15);
        assert!(config.data_strategy.includes_cot());
        assert!(config.allow_float_scores);
        assert_eq!(config.scratch_dir, Some(PathBuf::from("/tmp/exports")));
    }

    #[test]
    fn test_system_message_falls_back_to_instruction() {
        let config = ForgeConfig::default();
        assert_eq!(config.system_message_for("Summarize."), "Summarize.");
    }

    #[test]
    fn test_from_yaml_file_partial() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("forge.yaml");
        std::fs::write(
            &path,
            "format: huggingface_chat_template_jsonl\ndata_strategy: final_and_intermediate\n",
        )
        .expect("Write should succeed");

        let config = ForgeConfig::from_yaml_file(&path).expect("Config should load");
        assert_eq!(config.format, DatasetFormat::HuggingfaceChatTemplate);
        assert_eq!(config.data_strategy, FinetuneDataStrategy::FinalAndIntermediate);
        assert_eq!(config.projects_dir, PathBuf::from(DEFAULT_PROJECTS_DIR));
    }

    #[test]
    fn test_from_yaml_file_errors() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let missing = ForgeConfig::from_yaml_file(temp_dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = temp_dir.path().join("bad.yaml");
        std::fs::write(&path, "format: csv\n").expect("Write should succeed");
        let bad = ForgeConfig::from_yaml_file(&path);
        assert!(matches!(bad, Err(ConfigError::Yaml { .. })));
    }
}
