use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use trajan::engine::config::KernelPreference;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu",
    version,
    about = "Trajan CLI - Incremental, multi-threaded analysis of molecular-dynamics trajectories.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of worker threads.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every result of a project and export the series, statistics and correlations as CSV.
    Analyze(AnalyzeArgs),
    /// Validate a project file and its selection expressions without loading any frame.
    Check(CheckArgs),
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Path to the project description file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub project: PathBuf,

    /// Directory the CSV tables are written to. Created if missing.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Recompute every result, even those already up to date.
    #[arg(long)]
    pub rebuild_all: bool,

    /// Run on a single worker thread, overriding --threads and the project file.
    #[arg(long)]
    pub single_threaded: bool,

    /// Override the alignment kernel from the project file.
    #[arg(long, value_enum, value_name = "KIND")]
    pub kernel: Option<KernelArg>,

    /// Override the sweep bound of the eigensolver.
    #[arg(long, value_name = "INT")]
    pub max_jacobi_sweeps: Option<usize>,

    /// Set a specific configuration value, overriding the project file.
    /// Can be used multiple times. Example: -S engine.kernel=scalar
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Path to the project description file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub project: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArg {
    Auto,
    Scalar,
    Simd,
}

impl From<KernelArg> for KernelPreference {
    fn from(arg: KernelArg) -> Self {
        match arg {
            KernelArg::Auto => KernelPreference::Auto,
            KernelArg::Scalar => KernelPreference::Scalar,
            KernelArg::Simd => KernelPreference::Simd,
        }
    }
}
