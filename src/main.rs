use clap::Parser;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use codehem::cli::{Cli, Commands, ExtractArgs, PatchArgs};
use codehem::error::{CodeHemError, Result};
use codehem::registry;
use codehem::schema::Element;
use codehem::workspace::atomic_write;
use codehem::CodeHem;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // CODEHEM_DEBUG=1 raises verbosity regardless of flags
    let debug_env = std::env::var("CODEHEM_DEBUG").map(|v| v == "1").unwrap_or(false);
    let default_level = if cli.verbose || debug_env { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            err.exit_code()
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Detect(args) => {
            let engine = CodeHem::from_file_path(&args.file)?;
            println!("{}", engine.language_code());
            Ok(())
        }
        Commands::Extract(args) => extract(&args),
        Commands::Patch(args) => patch(&args),
    }
}

fn extract(args: &ExtractArgs) -> Result<()> {
    if args.recursive {
        for entry in ignore::WalkBuilder::new(&args.file).build() {
            let entry = entry.map_err(|e| CodeHemError::Validation {
                message: format!("cannot walk {}: {}", args.file.display(), e),
            })?;
            let path = entry.path();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file && registry::global().get_for_path(path).is_some() {
                println!("{}", path.display());
                extract_one(path, args.raw_json)?;
            }
        }
        return Ok(());
    }

    extract_one(&args.file, args.raw_json)
}

fn extract_one(path: &Path, raw_json: bool) -> Result<()> {
    let engine = CodeHem::from_file_path(path)?;
    let source = fs::read_to_string(path)?;
    let tree = engine.extract(&source)?;

    if raw_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&tree).map_err(|e| CodeHemError::Validation {
                message: format!("cannot serialize tree: {}", e),
            })?
        );
        return Ok(());
    }

    fn summarize(element: &Element, depth: usize) {
        println!(
            "{}{} {} [{}-{}]",
            "  ".repeat(depth),
            element.kind,
            if element.name.is_empty() { "(imports)" } else { element.name.as_str() },
            element.range.start_line,
            element.range.end_line,
        );
        for child in &element.children {
            summarize(child, depth + 1);
        }
    }
    for element in &tree.elements {
        summarize(element, 0);
    }
    Ok(())
}

fn patch(args: &PatchArgs) -> Result<()> {
    let engine = CodeHem::from_file_path(&args.file)?;
    let source = fs::read_to_string(&args.file)?;
    let new_code = fs::read_to_string(&args.new_code_file)?;

    let original_hash = match &args.original_hash {
        Some(hash) => Some(hash.clone()),
        // Pin the current hash so an external change between read and write
        // surfaces as a conflict instead of silently winning.
        None => engine.get_element_hash(&source, &args.xpath)?,
    };

    let result = engine.apply_patch(
        &source,
        &args.xpath,
        &new_code,
        args.mode.into(),
        original_hash.as_deref(),
        args.dry_run,
    )?;

    if args.dry_run {
        if let Some(diff) = &result.diff {
            print!("{}", diff);
        }
        return Ok(());
    }

    let modified = result.modified_code.as_ref().ok_or_else(|| {
        CodeHemError::Validation {
            message: "patch produced no buffer".to_string(),
        }
    })?;
    atomic_write(&args.file, modified.as_bytes())?;

    println!(
        "applied: +{} -{} lines, new hash {}",
        result.lines_added, result.lines_removed, result.new_hash
    );
    Ok(())
}
