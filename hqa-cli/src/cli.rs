use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use hqa_telemetry::TelemetryConfig;

#[derive(Debug, Parser)]
#[command(name = "hqa", version, about = "Hybrid retrieval and grounded question answering over tabular data")]
pub struct Cli {
    /// Settings file (YAML) overlaid onto the built-in defaults
    #[arg(short, long, global = true, env = "HQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log records as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also append log records to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let default_filter = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        TelemetryConfig {
            json: self.json_logs,
            log_file: self.log_file.clone(),
            default_filter: default_filter.to_string(),
            ..TelemetryConfig::new("hqa")
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage vector store collections and the registry that tracks them
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },
    /// Read table files and index their rows into a collection
    Ingest(IngestArgs),
    /// Answer a question from a collection
    Ask(AskArgs),
    /// Answer and score a labeled question set
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Subcommand)]
pub enum CollectionsAction {
    /// List registered collections
    List,
    /// Create an empty collection
    Create { name: String },
    /// Delete a collection and its registry entry
    Delete { name: String },
    /// List the files ingested into a collection
    Files { name: String },
    /// Compare the registry with the collections the store reports
    Reconcile,
}

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Target collection; must already exist
    pub collection: String,

    /// CSV, Excel/ODS, HTML or Parquet files sharing one column layout
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Column holding the passage text
    #[arg(long)]
    pub text_field: String,

    /// Columns copied into passage metadata (comma separated or repeated)
    #[arg(long = "metadata-field", value_delimiter = ',')]
    pub metadata_fields: Vec<String>,

    /// Passages per upsert batch; defaults to `qdrant.chunk_size`
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Parser)]
pub struct AskArgs {
    pub collection: String,

    pub question: String,

    /// Replace the configured system prompt
    #[arg(long)]
    pub prompt: Option<String>,

    /// Replace the configured model id
    #[arg(long)]
    pub model: Option<String>,

    /// Replace the configured provider (azure_openai, openai, cohere)
    #[arg(long)]
    pub provider: Option<String>,

    /// Print the question, context and answer as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct EvaluateArgs {
    /// CSV with `question` and `ground_truth` columns
    pub testset: PathBuf,

    /// Where the scored rows are written
    #[arg(short, long, default_value = "evaluation.csv")]
    pub output: PathBuf,

    /// Collection the questions are answered from
    #[arg(long, required_unless_present = "skip_answering")]
    pub collection: Option<String>,

    /// Score the answers already present in the test set
    #[arg(long)]
    pub skip_answering: bool,

    /// Let the judge model correct each answer against its contexts before scoring
    #[arg(long)]
    pub critic: bool,

    /// Metrics to compute; defaults to `eval.metrics`
    #[arg(long, value_delimiter = ',')]
    pub metrics: Vec<String>,

    /// Number of equal chunks; defaults to `eval.chunks_amount`
    #[arg(long)]
    pub chunks: Option<usize>,

    /// Seconds to wait between chunks; defaults to `eval.pacing_secs`
    #[arg(long)]
    pub pacing_secs: Option<u64>,
}
