//! CLI argument definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::schema::PatchMode;

/// Syntax-aware code query and patching engine
#[derive(Parser, Debug)]
#[command(name = "codehem")]
#[command(about = "Locate and patch code elements by compact path expressions")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect the language of a file
    Detect(DetectArgs),

    /// Extract the element tree of a file
    Extract(ExtractArgs),

    /// Apply a patch to an element addressed by a path expression
    Patch(PatchArgs),
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// File to inspect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// File (or directory with --recursive) to extract
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print a compact per-element summary (default)
    #[arg(long, conflicts_with = "raw_json")]
    pub summary: bool,

    /// Dump the serialized element tree as JSON
    #[arg(long)]
    pub raw_json: bool,

    /// Walk a directory and extract every supported file
    #[arg(long)]
    pub recursive: bool,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    /// Target file to modify
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Path expression addressing the element
    #[arg(long)]
    pub xpath: String,

    /// File containing the new code fragment
    #[arg(long = "file", value_name = "NEW_CODE")]
    pub new_code_file: PathBuf,

    /// Patch mode
    #[arg(long, value_enum, default_value = "replace")]
    pub mode: CliPatchMode,

    /// Preview the unified diff without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Expected fragment hash for conflict detection
    #[arg(long)]
    pub original_hash: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CliPatchMode {
    Replace,
    Append,
    Prepend,
}

impl From<CliPatchMode> for PatchMode {
    fn from(mode: CliPatchMode) -> Self {
        match mode {
            CliPatchMode::Replace => PatchMode::Replace,
            CliPatchMode::Append => PatchMode::Append,
            CliPatchMode::Prepend => PatchMode::Prepend,
        }
    }
}
