use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use worldforge_core::config::WorldforgeConfig;
use worldforge_core::transfer::import::{
    ImportFile, ValidationResult, read_import_file, validate_graph,
};

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Graph file to check (JSON)
    pub file: PathBuf,

    /// Print a JSON report instead of text
    #[arg(long)]
    pub json: bool,
}

pub async fn run(
    args: ValidateArgs,
    config: &WorldforgeConfig,
    opts: &GlobalOpts,
) -> anyhow::Result<()> {
    let file = ImportFile::from_path(&args.file)
        .with_context(|| format!("Cannot import {}", args.file.display()))?;
    let mut document = read_import_file(&file, config.import.max_file_size)
        .await
        .with_context(|| format!("Cannot import {}", file.name))?;

    if args.json {
        let outcome = validate_graph(&mut document);
        let fatal = outcome.as_ref().err().cloned();
        let result = ValidationResult::from(outcome);
        let report = serde_json::json!({
            "success": result.success,
            "error": result.error,
            "warnings": result.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return match fatal {
            Some(e) => Err(e).with_context(|| format!("{} is not a valid graph", file.name)),
            None => Ok(()),
        };
    }

    let graph = validate_graph(&mut document)
        .with_context(|| format!("{} is not a valid graph", file.name))?;
    if opts.quiet {
        return Ok(());
    }

    println!(
        "{}: {} nodes, {} edges, {} warning{}",
        file.name,
        graph.nodes.len(),
        graph.edges.len(),
        graph.warnings.len(),
        if graph.warnings.len() == 1 { "" } else { "s" }
    );
    for warning in &graph.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}
