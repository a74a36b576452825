use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use worldforge_core::config::WorldforgeConfig;
use worldforge_core::session::EditorSession;
use worldforge_core::transfer::export::ExportFormat;
use worldforge_core::transfer::import::{ImportFile, ImportStrategy};

use super::{GlobalOpts, resolve_format, write_artifact};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Graph file to read (JSON)
    pub file: PathBuf,

    /// Output format: json, csv or graphml (default from config)
    #[arg(short, long)]
    pub format: Option<ExportFormat>,

    /// Directory to write the export into
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// File name (default: graph-export-<date>.<ext>)
    #[arg(long)]
    pub filename: Option<String>,
}

pub async fn run(
    args: ConvertArgs,
    config: WorldforgeConfig,
    opts: &GlobalOpts,
) -> anyhow::Result<()> {
    let format = resolve_format(args.format, &config);
    info!(file = %args.file.display(), %format, "Converting graph");
    let file = ImportFile::from_path(&args.file)
        .with_context(|| format!("Cannot import {}", args.file.display()))?;

    let mut session = EditorSession::offline(config);
    let outcome = session
        .import(&file, ImportStrategy::Replace)
        .await
        .with_context(|| format!("Cannot import {}", file.name))?;
    if !opts.quiet {
        for warning in &outcome.warnings {
            eprintln!("warning: {warning}");
        }
    }

    let artifact = session
        .export(format, args.filename.as_deref())
        .context("Export failed")?;
    write_artifact(&artifact, &args.output, opts)?;
    Ok(())
}
