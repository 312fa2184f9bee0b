// Logging behavior:
// - Writes to both stderr and a daily-rotated file under the directory of
//   `log.log_path`.
// - The configured `log.level` is the default; RUST_LOG overrides it for
//   fine-grained per-module control (e.g. RUST_LOG=echohub_asr=trace).
// - File output uses a non-blocking writer with ANSI disabled.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use echohub_app::config::LogConfig;
use echohub_app::{Config, Hub};

#[derive(Parser, Debug)]
#[command(name = "echohub", version, about = "Voice assistant hub")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long = "config-path", default_value = "config.yaml")]
    config_path: PathBuf,

    /// Print the default configuration as YAML and exit
    #[arg(long)]
    dump: bool,
}

fn init_logging(
    log: &LogConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    let path = Path::new(&log.log_path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("logs"));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("echohub.log");
    std::fs::create_dir_all(dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| log.level.clone());
    let env_filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = fmt::layer().with_writer(non_blocking_file).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.dump {
        print!("{}", Config::default().to_yaml());
        return ExitCode::SUCCESS;
    }

    if !cli.config_path.exists() {
        eprintln!("config file {} does not exist", cli.config_path.display());
        return ExitCode::FAILURE;
    }

    let config = match Config::load(&cli.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match init_logging(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(config = %cli.config_path.display(), "starting echohub");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let hub = Hub::new(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!(addr = %config.addr, "device hub listening");

    let router = hub.router();
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(hub.clone()))
        .await?;

    // Give live sessions a bounded window to observe cancellation and
    // tear their upstream connections down.
    let grace = Duration::from_secs(10);
    let drained = tokio::time::timeout(grace, async {
        while !hub.registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;

    match drained {
        Ok(()) => tracing::info!("all sessions drained"),
        Err(_) => tracing::warn!(remaining = hub.registry.len(), "shutdown grace expired"),
    }
    Ok(())
}

async fn shutdown_signal(hub: Arc<Hub>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown requested");
    hub.cancel.cancel();
}
