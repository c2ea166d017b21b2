//! Command-line surface.

use std::path::PathBuf;

use annocurate_core::RepetitionStrategy;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "annocurate",
    version,
    about = "Curate multi-model image annotation files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Files to operate on: one file, several files, or a directory.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Glob applied inside directories [env: ANNOCURATE_PATTERN, default: shared*.json]
    #[arg(long)]
    pub pattern: Option<String>,
    /// Skip files whose name starts with this prefix [env: ANNOCURATE_EXCLUDE_PREFIX]
    #[arg(long)]
    pub exclude_prefix: Option<String>,
}

/// A single annotation directory.
#[derive(Args, Debug, Clone)]
pub struct DirArgs {
    pub dir: PathBuf,
    /// Glob applied inside the directory [env: ANNOCURATE_PATTERN, default: shared*.json]
    #[arg(long)]
    pub pattern: Option<String>,
    /// Skip files whose name starts with this prefix [env: ANNOCURATE_EXCLUDE_PREFIX]
    #[arg(long)]
    pub exclude_prefix: Option<String>,
}

impl From<DirArgs> for InputArgs {
    fn from(args: DirArgs) -> Self {
        InputArgs {
            paths: vec![args.dir],
            pattern: args.pattern,
            exclude_prefix: args.exclude_prefix,
        }
    }
}

/// Where modified files go.
#[derive(Args, Debug, Clone, Default)]
pub struct WriteArgs {
    /// Write modified files here instead of overwriting them
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Compute and report, but never write
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    #[default]
    Quick,
    Full,
}

impl From<StrategyArg> for RepetitionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Quick => RepetitionStrategy::QuickScan,
            StrategyArg::Full => RepetitionStrategy::FullScan,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Files processed, total annotations and per-model counts
    Stats(DirArgs),

    /// Reorder model annotations
    Reorder {
        #[command(flatten)]
        input: InputArgs,
        /// Comma-separated model order (defaults to the standard order)
        #[arg(long, value_delimiter = ',')]
        order: Vec<String>,
        #[command(flatten)]
        write: WriteArgs,
    },

    /// Remove one model's annotations
    Remove {
        #[command(flatten)]
        input: InputArgs,
        /// Model whose annotations are dropped
        #[arg(long)]
        model: String,
        #[command(flatten)]
        write: WriteArgs,
    },

    /// Drop annotations whose summed total_tokens falls outside the bounds
    FilterTokens {
        #[command(flatten)]
        input: InputArgs,
        /// Inclusive lower bound; 0 means none
        #[arg(long)]
        min: Option<u64>,
        /// Inclusive upper bound; 0 means none
        #[arg(long)]
        max: Option<u64>,
        #[command(flatten)]
        write: WriteArgs,
    },

    /// Export every prompt response to CSV
    Export {
        #[command(flatten)]
        dir: DirArgs,
        output: PathBuf,
        /// Add token and timing columns
        #[arg(long)]
        include_metrics: bool,
    },

    /// Diagnostic quality report (read-only)
    Check {
        #[command(flatten)]
        dir: DirArgs,
        /// Maximum response length in characters [env: ANNOCURATE_MAX_LENGTH, default: 10000]
        #[arg(long)]
        max_length: Option<usize>,
        /// Also write every issue to this CSV file
        #[arg(long)]
        output_csv: Option<PathBuf>,
        /// Only print the names of files with issues
        #[arg(long)]
        list_files_only: bool,
    },

    /// Recompute and store quality flags
    Flag {
        #[command(flatten)]
        input: InputArgs,
        /// Maximum response length in characters [env: ANNOCURATE_MAX_LENGTH, default: 10000]
        #[arg(long)]
        max_length: Option<usize>,
        /// Repetition detector; only `full` describes the pattern it finds
        #[arg(long, value_enum, default_value_t = StrategyArg::Quick)]
        strategy: StrategyArg,
        #[command(flatten)]
        write: WriteArgs,
    },

    /// List every flagged prompt result
    ListFlagged(DirArgs),

    /// Strip flagged prompt entries so they can be regenerated
    RemoveFlagged {
        #[command(flatten)]
        input: InputArgs,
        /// Only remove entries carrying one of these comma-separated flags
        #[arg(long)]
        flag_types: Option<String>,
        #[command(flatten)]
        write: WriteArgs,
    },

    /// Show which prompts each model is missing (re-annotation plan)
    Missing(DirArgs),
}
