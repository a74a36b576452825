pub mod convert;
pub mod health;
pub mod prefs;
pub mod pull;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use worldforge_core::config::{CONFIG_FILE_NAME, WorldforgeConfig};
use worldforge_core::transfer::export::{ExportArtifact, ExportFormat};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a graph file and list data-quality warnings
    Validate(validate::ValidateArgs),
    /// Import a graph file and export it in another format
    Convert(convert::ConvertArgs),
    /// Fetch nodes from a remote store and export them
    Pull(pull::PullArgs),
    /// Report whether a remote store is healthy
    Health(health::HealthArgs),
    /// Show or change persisted editor preferences
    Prefs(prefs::PrefsArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

pub async fn run(cmd: Command, opts: GlobalOpts) -> anyhow::Result<()> {
    let config = load_config(opts.config.as_deref())?;
    match cmd {
        Command::Validate(args) => validate::run(args, &config, &opts).await,
        Command::Convert(args) => convert::run(args, config, &opts).await,
        Command::Pull(args) => pull::run(args, config, &opts).await,
        Command::Health(args) => health::run(args, config, &opts).await,
        Command::Prefs(args) => prefs::run(args, &config, &opts),
    }
}

/// Explicit path, else `./worldforge.toml` when present, else defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<WorldforgeConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if !local.exists() {
                return Ok(WorldforgeConfig::default());
            }
            local
        }
    };
    WorldforgeConfig::load(&path)
        .with_context(|| format!("Cannot load config: {}", path.display()))
}

/// Format from the flag, falling back to the configured default.
pub fn resolve_format(flag: Option<ExportFormat>, config: &WorldforgeConfig) -> ExportFormat {
    flag.unwrap_or(config.export.default_format)
}

pub fn write_artifact(
    artifact: &ExportArtifact,
    output: &Path,
    opts: &GlobalOpts,
) -> anyhow::Result<PathBuf> {
    let path = artifact
        .write_to(output)
        .with_context(|| format!("Cannot write export to {}", output.display()))?;
    if !opts.quiet {
        println!("Wrote {} ({})", path.display(), artifact.mime_type);
    }
    Ok(path)
}
