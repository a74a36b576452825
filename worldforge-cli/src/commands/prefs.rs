use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use worldforge_core::config::WorldforgeConfig;
use worldforge_core::error::ConfigError;
use worldforge_core::persistence::{LocalPreferences, SqliteKeyValueStore};

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct PrefsArgs {
    /// Local preference database
    #[arg(long, default_value = "worldforge.db")]
    pub db: PathBuf,

    #[arg(long)]
    pub snap_to_grid: Option<bool>,

    #[arg(long)]
    pub grid_size: Option<u32>,

    #[arg(long)]
    pub autosave: Option<bool>,

    /// Autosave interval in milliseconds
    #[arg(long)]
    pub autosave_interval: Option<u64>,

    #[arg(long)]
    pub history_depth: Option<usize>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl PrefsArgs {
    fn has_changes(&self) -> bool {
        self.snap_to_grid.is_some()
            || self.grid_size.is_some()
            || self.autosave.is_some()
            || self.autosave_interval.is_some()
            || self.history_depth.is_some()
    }
}

pub fn run(args: PrefsArgs, config: &WorldforgeConfig, opts: &GlobalOpts) -> anyhow::Result<()> {
    let store = SqliteKeyValueStore::open(&args.db)
        .with_context(|| format!("Cannot open database: {}", args.db.display()))?;
    let mut prefs = LocalPreferences::load(&store, &config.editor)
        .context("Cannot read stored preferences")?;

    if args.has_changes() {
        if args.grid_size == Some(0) || args.history_depth == Some(0) {
            return Err(ConfigError::Invalid(
                "grid size and history depth must be greater than zero".into(),
            )
            .into());
        }
        if let Some(v) = args.snap_to_grid {
            prefs.snap_to_grid = v;
        }
        if let Some(v) = args.grid_size {
            prefs.grid_size = v;
        }
        if let Some(v) = args.autosave {
            prefs.autosave_enabled = v;
        }
        if let Some(v) = args.autosave_interval {
            prefs.autosave_interval_ms = v;
        }
        if let Some(v) = args.history_depth {
            prefs.history_depth = v;
        }
        prefs.save(&store).context("Cannot save preferences")?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else if !opts.quiet {
        println!("  snap to grid:      {}", prefs.snap_to_grid);
        println!("  grid size:         {}", prefs.grid_size);
        println!("  autosave:          {}", prefs.autosave_enabled);
        println!("  autosave interval: {} ms", prefs.autosave_interval_ms);
        println!("  history depth:     {}", prefs.history_depth);
    }
    Ok(())
}
