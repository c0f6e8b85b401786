//! CLI Tooling
//!
//! Each invocation builds a fresh index from the given record files, applying
//! every file as one batch through the merge queue, then reports on it.

use crate::config::{ConfigLoader, OrgTreeConfig};
use crate::error::ApiError;
use crate::ingest::parse_batch;
use crate::logging::LoggingConfig;
use crate::merge::{Batch, BatchReport, MergeEngine};
use crate::queue::{BatchSource, MergeQueue};
use crate::views::{self, format_report_text, format_section_heading, format_tree_text};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// orgtree - Incremental organization/site hierarchy index
#[derive(Parser)]
#[command(name = "orgtree")]
#[command(about = "Build and inspect organization/site hierarchies from record batches")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// `base` with the command-line logging flags applied on top
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply record files in order, one batch per file, and print each batch report
    Apply {
        /// JSON files: record arrays or hierarchy payloads
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Apply record files and print the resulting tree
    Tree {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Apply record files and print the root-to-node path of a key
    Path {
        key: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Apply { .. } => "apply",
        Commands::Tree { .. } => "tree",
        Commands::Path { .. } => "path",
        Commands::Config => "config",
    }
}

/// CLI context holding the effective configuration
pub struct CliContext {
    config: OrgTreeConfig,
}

impl CliContext {
    /// Load configuration (global file, then `config_path`, then environment)
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self { config })
    }

    pub fn from_config(config: OrgTreeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrgTreeConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = match command {
            Commands::Apply { files, format } => self.handle_apply(files, format),
            Commands::Tree { files, format } => self.handle_tree(files, format),
            Commands::Path { key, files } => self.handle_path(key, files),
            Commands::Config => ConfigLoader::to_toml(&self.config).map_err(ApiError::from),
        };
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn handle_apply(&self, files: &[PathBuf], format: &str) -> Result<String, ApiError> {
        let format = OutputFormat::parse(format)?;
        let (_, reports) = self.build_index(files)?;
        match format {
            OutputFormat::Json => {
                let documents: Vec<_> = files
                    .iter()
                    .zip(&reports)
                    .map(|(file, report)| json!({ "file": file, "report": report }))
                    .collect();
                Ok(serde_json::to_string_pretty(&documents)?)
            }
            OutputFormat::Text => {
                let mut out = String::new();
                for (file, report) in files.iter().zip(&reports) {
                    out.push_str(&format!("{}\n", file.display()));
                    out.push_str(&format_report_text(report));
                    out.push('\n');
                }
                Ok(out.trim_end().to_string())
            }
        }
    }

    fn handle_tree(&self, files: &[PathBuf], format: &str) -> Result<String, ApiError> {
        let format = OutputFormat::parse(format)?;
        let (engine, _) = self.build_index(files)?;
        let rows = views::tree_rows(&engine);
        let orphans = engine.orphans();
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "rows": rows,
                "orphans": orphans
                    .iter()
                    .map(|(key, parent)| json!({ "key": key, "missing_parent": parent }))
                    .collect::<Vec<_>>(),
            }))?),
            OutputFormat::Text => {
                let mut out = format_tree_text(&rows);
                if !orphans.is_empty() {
                    out.push_str(&format!("\n{}\n", format_section_heading("Orphans")));
                    for (key, parent) in &orphans {
                        out.push_str(&format!("  {} (waiting for {})\n", key, parent));
                    }
                }
                Ok(out.trim_end().to_string())
            }
        }
    }

    fn handle_path(&self, key: &str, files: &[PathBuf]) -> Result<String, ApiError> {
        let (engine, _) = self.build_index(files)?;
        let path = engine.path_of(key)?;
        Ok(path.join(" / "))
    }

    /// Apply `files` through a merge queue and hand back the final engine
    fn build_index(&self, files: &[PathBuf]) -> Result<(MergeEngine, Vec<BatchReport>), ApiError> {
        let batches = files
            .iter()
            .map(|file| self.read_batch(file))
            .collect::<Result<Vec<_>, _>>()?;

        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ApiError::ConfigError(
                "Cannot run the merge queue from within an async runtime".to_string(),
            ));
        }
        let rt = tokio::runtime::Runtime::new()?;
        let queue_config = self.config.queue.clone();
        rt.block_on(async move {
            let queue = MergeQueue::start(MergeEngine::new(), &queue_config);
            let mut reports = Vec::with_capacity(batches.len());
            for batch in batches {
                reports.push(queue.submit(BatchSource::BulkLoad, batch).await?);
            }
            let engine = queue.into_engine().await?;
            Ok::<_, ApiError>((engine, reports))
        })
    }

    fn read_batch(&self, file: &Path) -> Result<Batch, ApiError> {
        let text = std::fs::read_to_string(file)?;
        let batch = parse_batch(&text, self.config.ingest.parent_preference)?;
        info!(file = %file.display(), directives = batch.len(), "Loaded batch file");
        Ok(batch)
    }
}

enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(format: &str) -> Result<Self, ApiError> {
        match format {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }
}
