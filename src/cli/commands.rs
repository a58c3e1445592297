//! CLI command definitions for tune-forge.
//!
//! Commands operate on a filesystem task store: print a task's grading
//! score schema, export a dataset split as fine-tuning JSONL, and apply a
//! JSON patch to a stored run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::config::ForgeConfig;
use crate::datamodel::FinetuneDataStrategy;
use crate::eval::build_score_schema;
use crate::export::{DatasetFormat, DatasetFormatter};
use crate::runs::RunUpdater;
use crate::storage::{FsTaskStore, TaskStore};

/// Build grading schemas and fine-tuning datasets from recorded task runs.
#[derive(Parser)]
#[command(name = "tune-forge")]
#[command(about = "Build grading schemas and fine-tuning datasets from recorded task runs")]
#[command(version)]
#[command(
    long_about = "tune-forge reads tasks, runs and dataset splits from a project directory.\n\nIt prints rubric score schemas for automated graders, exports dataset splits as provider-specific JSONL training files, and applies partial updates to stored runs.\n\nExample usage:\n  tune-forge export --project support --task t1 --dataset d1 --split train --format openai_chat_jsonl"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Root directory of the task store. Overrides the config file.
    #[arg(long, env = "TUNE_FORGE_PROJECTS_DIR", global = true)]
    pub projects_dir: Option<PathBuf>,

    /// YAML config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Print the JSON schema a grader must fill in for a task's rubric.
    #[command(alias = "schema")]
    ScoreSchema(ScoreSchemaArgs),

    /// Export one split of a dataset as a JSONL fine-tuning file.
    Export(ExportArgs),

    /// Deep-merge a JSON patch into a stored run and print the result.
    UpdateRun(UpdateRunArgs),
}

/// Arguments for `tune-forge score-schema`.
#[derive(Parser, Debug)]
pub struct ScoreSchemaArgs {
    /// Project ID.
    #[arg(short, long)]
    pub project: String,

    /// Task ID.
    #[arg(short, long)]
    pub task: String,

    /// Use continuous ranges instead of discrete choices for ratings.
    #[arg(long)]
    pub float: bool,
}

/// Arguments for `tune-forge export`.
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Project ID.
    #[arg(short, long)]
    pub project: String,

    /// Task ID.
    #[arg(short, long)]
    pub task: String,

    /// Dataset split ID.
    #[arg(short, long)]
    pub dataset: String,

    /// Split name inside the dataset (e.g. train, val).
    #[arg(short, long)]
    pub split: String,

    /// Output format identifier (e.g. openai_chat_jsonl, vertex_gemini_1_5).
    #[arg(short, long)]
    pub format: Option<String>,

    /// Fine-tune data strategy: final_only or final_and_intermediate.
    #[arg(long)]
    pub strategy: Option<String>,

    /// Output file. Defaults to a generated name in the scratch directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// System message for every example. Defaults to the task instruction.
    #[arg(long, env = "TUNE_FORGE_SYSTEM_MESSAGE")]
    pub system_message: Option<String>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `tune-forge update-run`.
#[derive(Parser, Debug)]
pub struct UpdateRunArgs {
    /// Project ID.
    #[arg(short, long)]
    pub project: String,

    /// Task ID.
    #[arg(short, long)]
    pub task: String,

    /// Run ID.
    #[arg(short, long)]
    pub run: String,

    /// File holding the JSON patch. Reads stdin when omitted.
    #[arg(long)]
    pub patch: Option<PathBuf>,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.projects_dir)?;
    debug!(projects_dir = %config.projects_dir.display(), "Using task store");

    match cli.command {
        Commands::ScoreSchema(args) => run_score_schema_command(&config, args).await?,
        Commands::Export(args) => run_export_command(&config, args).await?,
        Commands::UpdateRun(args) => run_update_run_command(&config, args).await?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>, projects_dir: Option<PathBuf>) -> anyhow::Result<ForgeConfig> {
    let config = match path {
        Some(path) => ForgeConfig::from_yaml_file(path)?,
        None => ForgeConfig::default(),
    };
    Ok(match projects_dir {
        Some(dir) => config.with_projects_dir(dir),
        None => config,
    })
}

async fn run_score_schema_command(config: &ForgeConfig, args: ScoreSchemaArgs) -> anyhow::Result<()> {
    let store = FsTaskStore::new(&config.projects_dir);
    let task = store.task(&args.project, &args.task).await?;
    let schema = build_score_schema(&task, args.float || config.allow_float_scores)
        .with_context(|| format!("Failed to build score schema for task '{}'", task.id))?;
    println!("{}", schema);
    Ok(())
}

async fn run_export_command(config: &ForgeConfig, args: ExportArgs) -> anyhow::Result<()> {
    let format = match args.format.as_deref() {
        Some(identifier) => identifier.parse::<DatasetFormat>()?,
        None => config.format,
    };
    let strategy = match args.strategy.as_deref() {
        Some(name) => name
            .parse::<FinetuneDataStrategy>()
            .map_err(anyhow::Error::msg)?,
        None => config.data_strategy,
    };

    let store = FsTaskStore::new(&config.projects_dir);
    let task = store.task(&args.project, &args.task).await?;
    let system_message = args
        .system_message
        .unwrap_or_else(|| config.system_message_for(&task.instruction).to_string());

    let mut formatter =
        DatasetFormatter::load(&store, &args.project, &args.task, &args.dataset, system_message)
            .await?;
    if let Some(dir) = &config.scratch_dir {
        formatter = formatter.with_scratch_dir(dir);
    }

    let export = formatter.dump_to_file(&args.split, format, strategy, args.output.as_deref())?;
    info!(
        examples = export.example_count,
        path = %export.path.display(),
        "Export complete"
    );

    if args.json {
        let summary = serde_json::json!({
            "path": export.path,
            "examples": export.example_count,
            "format": export.format,
            "include_cot": export.include_cot,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", export.path.display());
    }
    Ok(())
}

async fn run_update_run_command(config: &ForgeConfig, args: UpdateRunArgs) -> anyhow::Result<()> {
    let raw = match &args.patch {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read patch file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read patch from stdin")?;
            buf
        }
    };
    let patch: serde_json::Value =
        serde_json::from_str(&raw).context("Patch is not valid JSON")?;

    let updater = RunUpdater::new(Arc::new(FsTaskStore::new(&config.projects_dir)));
    let run = updater
        .update_run(&args.project, &args.task, &args.run, patch)
        .await?;
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_score_schema_command() {
        let args = vec!["tune-forge", "score-schema", "-p", "proj", "-t", "task1", "--float"];
        let cli = Cli::try_parse_from(args).expect("should parse");

        match cli.command {
            Commands::ScoreSchema(args) => {
                assert_eq!(args.project, "proj");
                assert_eq!(args.task, "task1");
                assert!(args.float);
            }
            _ => panic!("Expected ScoreSchema command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_schema_alias() {
        let args = vec!["tune-forge", "schema", "-p", "proj", "-t", "task1"];
        let cli = Cli::try_parse_from(args).expect("should parse with alias");
        assert!(matches!(cli.command, Commands::ScoreSchema(ref a) if !a.float));
    }

    #[test]
    fn test_export_command_with_all_options() {
        let args = vec![
            "tune-forge",
            "--log-level",
            "debug",
            "export",
            "-p",
            "proj",
            "-t",
            "task1",
            "-d",
            "ds1",
            "-s",
            "train",
            "-f",
            "vertex_gemini_1_5",
            "--strategy",
            "final_and_intermediate",
            "-o",
            "./out.jsonl",
            "--system-message",
            "Be brief.",
            "-j",
        ];
        let cli = Cli::try_parse_from(args).expect("should parse");
        assert_eq!(cli.log_level, "debug");

        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.dataset, "ds1");
                assert_eq!(args.split, "train");
                assert_eq!(args.format.as_deref(), Some("vertex_gemini_1_5"));
                assert_eq!(args.strategy.as_deref(), Some("final_and_intermediate"));
                assert_eq!(args.output, Some(PathBuf::from("./out.jsonl")));
                assert_eq!(args.system_message.as_deref(), Some("Be brief."));
                assert!(args.json);
            }
            _ => panic!("Expected Export command"),
        }
    }

    #[test]
    fn test_export_requires_split() {
        let args = vec!["tune-forge", "export", "-p", "proj", "-t", "task1", "-d", "ds1"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_update_run_command() {
        let args = vec![
            "tune-forge",
            "update-run",
            "-p",
            "proj",
            "-t",
            "task1",
            "-r",
            "run1",
            "--patch",
            "patch.json",
            "--projects-dir",
            "/data/projects",
        ];
        let cli = Cli::try_parse_from(args).expect("should parse");
        assert_eq!(cli.projects_dir, Some(PathBuf::from("/data/projects")));

        match cli.command {
            Commands::UpdateRun(args) => {
                assert_eq!(args.run, "run1");
                assert_eq!(args.patch, Some(PathBuf::from("patch.json")));
            }
            _ => panic!("Expected UpdateRun command"),
        }
    }

    #[test]
    fn test_load_config_projects_dir_override() {
        let config =
            load_config(None, Some(PathBuf::from("/srv/projects"))).expect("should load");
        assert_eq!(config.projects_dir, PathBuf::from("/srv/projects"));

        let config = load_config(None, None).expect("should load");
        assert_eq!(config, ForgeConfig::default());
    }
}
