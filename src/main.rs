mod actuator;
mod commands;
mod config;
mod executor;
mod prompt;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "calcron")]
#[command(about = "Keep scheduled commands or a relay in step with a calendar")]
struct Cli {
    /// Cancel everything previously scheduled and forget the sync watermark
    #[arg(long)]
    reset: bool,

    /// Settings file, relative to the home directory unless absolute
    #[arg(short, long, default_value = ".calcron")]
    settings_file: PathBuf,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// What this invocation does, for the closing log line.
    fn label(&self) -> &'static str {
        if self.reset { "Reset" } else { "Sync" }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let app = AppConfig::load();
    let log_path = app.as_ref().ok().and_then(|app| app.log_path().ok().flatten());
    let _guard = init_tracing(cli.verbose, log_path.as_deref());

    let label = cli.label();
    let outcome = match app {
        Ok(app) => run(cli, app).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => {
            info!("{label} succeeded");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{label} failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, app: AppConfig) -> Result<()> {
    let settings = config::home_path(&cli.settings_file)?;

    if cli.reset {
        commands::reset::run(&app, &settings).await
    } else {
        commands::sync::run(&app, &settings).await
    }
}

/// Log to stderr at `info` (`debug` with `-v`), and everything at `debug`
/// to `log_file` when one is configured.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let appender = log_file.map(|path| file_appender(path).map_err(|e| (path, e)));
    let (file, guard, setup_error) = match appender {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG);
            (Some(layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e)),
        None => (None, None, None),
    };

    let _ = tracing_subscriber::registry().with(stderr).with(file).try_init();

    if let Some((path, e)) = setup_error {
        warn!(path = %path.display(), "Could not open log file: {e:#}");
    }
    guard
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        anyhow::bail!("not a file path");
    };

    Ok(RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)?)
}
