use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// plan-executor - run named task plans with parallel steps and resumable failures
#[derive(Parser, Debug)]
#[command(name = "plan-executor")]
#[command(about = "Runs declarative task plans with parallel fan-out and resumable failures")]
#[command(version)]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one command from a plan file
    Run(RunArgs),
    /// Check every command in a plan file without running anything
    Validate {
        /// Path to the plan file
        #[arg(short, long)]
        planfile: PathBuf,
    },
    /// List the commands defined in a plan file
    List {
        /// Path to the plan file
        #[arg(short, long)]
        planfile: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the plan file
    #[arg(short, long)]
    pub planfile: PathBuf,

    /// Name of the command to run
    #[arg(short, long)]
    pub command: String,

    /// Runtime arguments substituted for ${0}, ${1}, ... (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub arguments: Vec<String>,

    /// Start at this step index
    #[arg(short, long, conflicts_with = "resume")]
    pub resume_from: Option<usize>,

    /// Start at the step recorded in the resume checkpoint
    #[arg(long)]
    pub resume: bool,

    /// Executable run by process steps (overrides PLAN_EXECUTOR_BIN)
    #[arg(short, long)]
    pub executable: Option<String>,

    /// Launch process steps through `sh -c`
    #[arg(long)]
    pub shell: bool,

    /// Resume checkpoint location
    #[arg(long, conflicts_with = "no_checkpoint")]
    pub checkpoint: Option<PathBuf>,

    /// Do not read or write a resume checkpoint
    #[arg(long)]
    pub no_checkpoint: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
