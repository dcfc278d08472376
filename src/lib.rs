mod cli;
mod commands;
pub mod core;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::{Cli, Command};
use crate::core::error::ModSyncResult;
use crate::core::state::{AppState, ResolvedConfig, SyncSettings};

const LOG_FILE_PREFIX: &str = "modsync.log";

/// Process entry point. Exits non-zero when the command aborts before
/// finishing its pass. Per-mod failures are logged and still exit zero.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Sync);

    let config = resolve_config(cli.config.as_deref(), cli.overrides.into_settings());
    let _guard = init_logging(config.as_ref().ok().map(|c| c.log_dir.as_path()));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(kind = %e.kind(), "Cannot start: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("modsync {} starting ({:?})", env!("CARGO_PKG_VERSION"), command);

    let result = match AppState::prepare(config).await {
        Ok(state) => match command {
            Command::Sync => commands::sync(&state).await.map(|_| ()),
            Command::Plan => commands::plan(&state).await,
            Command::List => commands::list(&state).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = %e.kind(), "Run aborted: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Defaults ← settings file ← environment/flags.
fn resolve_config(config_file: Option<&Path>, overrides: SyncSettings) -> ModSyncResult<ResolvedConfig> {
    let base = match config_file {
        Some(path) => SyncSettings::load(path)?,
        None => SyncSettings::load_default()?,
    };
    base.overlay(overrides).resolve()
}

/// Stderr plus a daily-rolling file under `log_dir`. The returned guard
/// flushes the file writer when dropped, so it must live until exit.
fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,modsync_lib=debug"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let mut dir_error = None;
    let (file_layer, guard) = match log_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_writer(writer).with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                dir_error = Some((dir.to_path_buf(), e));
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some((dir, e)) = dir_error {
        warn!("Cannot create log dir {:?} ({e}); logging to stderr only", dir);
    }

    guard
}
