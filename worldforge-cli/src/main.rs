use std::path::PathBuf;

use clap::Parser;

use worldforge_core::error::{
    ConfigError, ExportError, ImportError, PersistenceError, RemoteError, WorldforgeError,
};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "worldforge",
    version,
    about = "Validate, convert and sync world-building graphs"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to worldforge.toml (default: ./worldforge.toml if present)
    #[arg(long, global = true, env = "WORLDFORGE_CONFIG")]
    config: Option<PathBuf>,
}

/// Map an error to a process exit code.
///
///   0 — success
///   1 — general/unknown error
///   2 — configuration error
///   3 — import file rejected or invalid
///   4 — remote store error
///   5 — export or local storage failure
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return 2;
        }
        if cause.is::<ImportError>() {
            return 3;
        }
        if cause.is::<RemoteError>() {
            return 4;
        }
        if cause.is::<ExportError>() || cause.is::<PersistenceError>() {
            return 5;
        }
        if let Some(err) = cause.downcast_ref::<WorldforgeError>() {
            return match err {
                WorldforgeError::Config(_) => 2,
                WorldforgeError::Import(_) => 3,
                WorldforgeError::Remote(_) | WorldforgeError::Mutation(_) => 4,
                WorldforgeError::Export(_) | WorldforgeError::Persistence(_) => 5,
            };
        }
    }
    1
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let opts = commands::GlobalOpts {
        config: cli.config,
        quiet: cli.quiet,
    };
    match runtime.block_on(commands::run(cli.command, opts)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
