use clap::{Parser, Subcommand};
use screenwatch::{commands, logging};
use screenwatch_application::config::{load_config, Config};
use screenwatch_application::control::StopSignal;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "screenwatch")]
#[command(about = "Watches stock screeners during market hours and records cross-screener signals.", version)]
struct Cli {
    /// Config file path (TOML). If omitted, uses env SCREENWATCH_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scan loop until interrupted.
    Run {
        /// Serve pages from a replay fixture instead of the render sidecar.
        #[arg(long)]
        replay: Option<PathBuf>,
    },
    /// Run a single cycle and print its report.
    Once {
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Scan even outside the trading window.
        #[arg(long)]
        force: bool,
    },
    /// Validate the configuration and print a summary.
    CheckConfig,
    /// Print the persisted results.
    Show,
}

fn main() {
    let cli = Cli::parse();
    let config_path = commands::resolve_config_path(cli.config).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(1);
    });

    let result = match cli.command {
        Command::CheckConfig => commands::check_config(&config_path),
        Command::Show => load_config(&config_path).and_then(|config| commands::show(&config)),
        Command::Once { replay, force } => with_config(&config_path, |config| {
            commands::run_once(config, replay.as_deref(), force)
        }),
        Command::Run { replay } => with_config(&config_path, |config| run_until_interrupted(config, replay)),
    };

    match result {
        Ok(json) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
            );
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn with_config<F>(config_path: &Path, run: F) -> Result<serde_json::Value, String>
where
    F: FnOnce(&Config) -> Result<serde_json::Value, String>,
{
    let config = load_config(config_path)?;
    logging::init_tracing(
        config.log_level(),
        config.log_format(),
        Path::new(&config.paths.log_dir),
    )?;
    init_metrics()?;
    tracing::info!(config = %config_path.display(), "configuration loaded");
    run(&config)
}

fn run_until_interrupted(config: &Config, replay: Option<PathBuf>) -> Result<serde_json::Value, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| format!("failed to build tokio runtime: {err}"))?;

    let stop = StopSignal::new();
    let config = config.clone();
    let summary = runtime.block_on(async move {
        let signal_stop = stop.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
                return;
            }
            tracing::info!("interrupt received, stopping scan loop (press ctrl-c again to exit now)");
            signal_stop.request_stop();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("second interrupt received, exiting without waiting for the cycle");
                std::process::exit(130);
            }
        });

        let loop_stop = stop.clone();
        let handle = tokio::task::spawn_blocking(move || {
            commands::run_loop(&config, replay.as_deref(), &loop_stop)
        });
        match handle.await {
            Ok(result) => result,
            Err(err) => Err(format!("scan loop task failed: {err}")),
        }
    })?;

    serde_json::to_value(summary).map_err(|err| format!("failed to encode loop summary: {err}"))
}

#[cfg(feature = "prometheus")]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = std::env::var("SCREENWATCH_METRICS_ADDR").ok() else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid SCREENWATCH_METRICS_ADDR (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    Ok(None)
}
