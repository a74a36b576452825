use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use worldforge_core::config::WorldforgeConfig;
use worldforge_core::error::RemoteError;
use worldforge_core::remote::HttpRemote;
use worldforge_core::session::EditorSession;

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Remote store base URL (default from config)
    #[arg(long)]
    pub remote: Option<String>,
}

pub async fn run(
    args: HealthArgs,
    config: WorldforgeConfig,
    opts: &GlobalOpts,
) -> anyhow::Result<()> {
    let base_url = args
        .remote
        .unwrap_or_else(|| config.remote.base_url.clone());
    let remote = HttpRemote::new(&base_url, Duration::from_secs(config.remote.timeout_secs))
        .with_context(|| format!("Cannot create client for {base_url}"))?;
    let session = EditorSession::new(config, Arc::new(remote));

    let healthy = session
        .health()
        .await
        .with_context(|| format!("Health check against {base_url} failed"))?;
    if !healthy {
        return Err(RemoteError::Rejected(format!("{base_url} reports unhealthy")).into());
    }
    if !opts.quiet {
        println!("{base_url}: ok");
    }
    Ok(())
}
