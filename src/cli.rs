use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "memjobs",
    version,
    about = "Extract structured congressional job listings with a local language model"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Inventory(InventoryArgs),
    Status(StatusArgs),
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, env = "MEMJOBS_INPUT_DIR", default_value = "output")]
    pub input_dir: PathBuf,

    #[arg(long, env = "MEMJOBS_OUTPUT_DIR", default_value = "json_with_scores")]
    pub output_dir: PathBuf,

    /// Only documents whose filename contains this marker are processed.
    #[arg(long, env = "MEMJOBS_NAME_MARKER")]
    pub name_marker: Option<String>,

    #[arg(long, default_value = "MEM-")]
    pub delimiter: String,

    /// Reprocess documents even when their JSON output already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Also write every record of this run into one CSV file.
    #[arg(long)]
    pub csv_path: Option<PathBuf>,

    /// Processing stops between chunks once this file exists.
    #[arg(long, env = "MEMJOBS_STOP_FILE")]
    pub stop_file: Option<PathBuf>,

    #[command(flatten)]
    pub scores: ScoreArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub retry: RetryArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    /// CSV export of the legislator score spreadsheet.
    #[arg(long, env = "MEMJOBS_SCORE_FILE")]
    pub score_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = JoinKey::District)]
    pub join_key: JoinKey,

    #[arg(long, default_value = "Legislator name, as given in THOMAS")]
    pub name_column: String,

    #[arg(long, default_value = "Two-letter state code")]
    pub state_column: String,

    #[arg(long, default_value = "Congressional district number")]
    pub district_column: String,

    #[arg(long, default_value = "First-dimension DW-NOMINATE score")]
    pub nominate_column: String,

    #[arg(long, default_value = "LES 1.0")]
    pub les_column: String,

    /// Keep only rows from the highest session found in this column. Ignored
    /// when the score file has no such column.
    #[arg(long, default_value = "Congress number")]
    pub session_column: Option<String>,

    #[arg(long, default_value_t = false)]
    pub no_session_filter: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    #[arg(long, env = "MEMJOBS_BASE_URL", default_value = "http://localhost:11434/v1")]
    pub base_url: String,

    #[arg(long, env = "MEMJOBS_API_KEY", default_value = "ollama", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "MEMJOBS_MODEL", default_value = "llama3.2")]
    pub model: String,

    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    #[arg(long, default_value_t = 300)]
    pub request_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct RetryArgs {
    #[arg(long, env = "MEMJOBS_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 2000)]
    pub backoff_ms: u64,

    #[arg(long, value_enum, default_value_t = RetryMode::Classified)]
    pub retry_mode: RetryMode,

    /// Minimum spacing between two inference requests; 0 disables throttling.
    #[arg(long, env = "MEMJOBS_REQUEST_DELAY_MS", default_value_t = 5000)]
    pub request_delay_ms: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum JoinKey {
    District,
    Name,
}

impl JoinKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::District => "district",
            Self::Name => "name",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RetryMode {
    Classified,
    Uniform,
}

impl RetryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classified => "classified",
            Self::Uniform => "uniform",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, env = "MEMJOBS_INPUT_DIR", default_value = "output")]
    pub input_dir: PathBuf,

    #[arg(long, env = "MEMJOBS_NAME_MARKER")]
    pub name_marker: Option<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, env = "MEMJOBS_OUTPUT_DIR", default_value = "json_with_scores")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long, env = "MEMJOBS_OUTPUT_DIR", default_value = "json_with_scores")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "enriched_job_listings.csv")]
    pub csv_path: PathBuf,
}
