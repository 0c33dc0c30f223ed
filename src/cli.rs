use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::report::PayloadSchema;

#[derive(Parser, Debug)]
#[command(
    name = "canary-report",
    version,
    about = "Normalize canary analysis results into a report view model"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Report(ReportArgs),
    Runs(RunsArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SchemaKind {
    /// `/canary` execution with one judgement.
    Single,
    /// `/canary_analysis` execution with a sequence of runs.
    Batch,
}

impl SchemaKind {
    pub fn payload_schema(self) -> PayloadSchema {
        match self {
            Self::Single => PayloadSchema::SingleRun,
            Self::Batch => PayloadSchema::RunBatch,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExecutionArgs {
    #[arg(long, default_value = ".cache/canary-report")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub execution_id: String,

    #[arg(long, value_enum, default_value_t = SchemaKind::Single)]
    pub schema: SchemaKind,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub execution: ExecutionArgs,

    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long)]
    pub metric_id: Option<String>,

    #[arg(long, default_value_t = false)]
    pub overview: bool,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunsArgs {
    #[command(flatten)]
    pub execution: ExecutionArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub execution: ExecutionArgs,
}
