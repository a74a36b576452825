use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::info;

use worldforge_core::config::WorldforgeConfig;
use worldforge_core::remote::HttpRemote;
use worldforge_core::session::EditorSession;
use worldforge_core::transfer::export::ExportFormat;

use super::{GlobalOpts, resolve_format, write_artifact};

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Remote store base URL (default from config)
    #[arg(long)]
    pub remote: Option<String>,

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

pub async fn run(args: PullArgs, config: WorldforgeConfig, opts: &GlobalOpts) -> anyhow::Result<()> {
    let format = resolve_format(args.format, &config);
    let base_url = args
        .remote
        .unwrap_or_else(|| config.remote.base_url.clone());
    let remote = HttpRemote::new(&base_url, Duration::from_secs(config.remote.timeout_secs))
        .with_context(|| format!("Cannot create client for {base_url}"))?;

    info!(remote = %base_url, %format, "Pulling nodes");
    let session = EditorSession::new(config, Arc::new(remote));
    let seeded = session
        .hydrate()
        .await
        .with_context(|| format!("Cannot fetch nodes from {base_url}"))?;
    if !seeded && !opts.quiet {
        eprintln!("Remote store at {base_url} has no nodes");
    }

    let artifact = session
        .export(format, args.filename.as_deref())
        .context("Export failed")?;
    write_artifact(&artifact, &args.output, opts)?;
    Ok(())
}
