use clap::Parser;
use instadoc_server::{FileConfig, Instance, Overrides, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "instadoc",
    version,
    about = "Disposable in-memory document store with a REST control plane for test fixtures"
)]
struct Cli {
    /// Port for the database server [default: 5001].
    #[arg(long)]
    db_port: Option<u16>,

    /// Port for the REST control server [default: 5000].
    #[arg(long)]
    rest_port: Option<u16>,

    /// Directory containing one subdirectory per fixture [default: ./fixtures].
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Database to load the initial fixture into.
    #[arg(long)]
    db: Option<String>,

    /// Fixture to load at startup (requires --db).
    #[arg(long)]
    load: Option<String>,

    /// Read settings from a TOML file; flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads per server [default: 4].
    #[arg(long)]
    workers: Option<usize>,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn settings(cli: Cli) -> Result<Settings, instadoc_server::ConfigError> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    Settings::resolve(
        file,
        Overrides {
            db_port: cli.db_port,
            rest_port: cli.rest_port,
            fixtures: cli.fixtures,
            workers: cli.workers,
            db: cli.db,
            load: cli.load,
        },
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_env("INSTADOC_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let settings = match settings(cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let instance = match Instance::start(&settings) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (tx, rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        warn!("failed to install Ctrl-C handler: {e}");
    }

    // Blocks until Ctrl-C; with no handler the sender is gone and this
    // returns at once, so fall back to parking forever.
    if rx.recv().is_err() {
        loop {
            std::thread::park();
        }
    }

    info!("shutting down");
    drop(instance);
    ExitCode::SUCCESS
}
