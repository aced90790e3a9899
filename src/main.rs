#![forbid(unsafe_code)]

//! `agent-sidecar` — NDJSON stdio broker binary.
//!
//! Bootstraps tracing (to stderr — stdout carries the protocol), builds
//! the tokio runtime, wires termination signals to the broker's shutdown
//! token, and runs the broker over the process's stdin/stdout.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_sidecar::broker::Broker;
use agent_sidecar::engine::cli::{CliEngine, CliEngineConfig};
use agent_sidecar::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-sidecar", about = "NDJSON stdio broker for agent conversations", version, long_about = None)]
struct Cli {
    /// Log output format (text or json). Logs go to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Host CLI binary spawned per conversation.
    #[arg(long, default_value = "claude")]
    engine_cmd: String,

    /// Extra argument passed to the host CLI (repeatable).
    #[arg(long = "engine-arg")]
    engine_args: Vec<String>,
}

fn main() -> ExitCode {
    let args = Cli::parse();

    // Bootstrap failures (before the loop starts) are the only exit-1 path.
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("agent-sidecar: {err}");
        return ExitCode::FAILURE;
    }
    info!("agent-sidecar bootstrap");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => {
            info!("agent-sidecar shut down");
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Caught at the outermost handler after the loop started:
            // log and exit gracefully so the host sees a clean stop.
            error!(%err, "sidecar terminated after top-level failure");
            ExitCode::SUCCESS
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let engine = Arc::new(CliEngine::new(CliEngineConfig {
        binary: args.engine_cmd,
        args: args.engine_args,
    }));

    // Wire SIGINT/SIGTERM to the broker's shutdown token.
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    Broker::new(engine)
        .run(tokio::io::stdin(), tokio::io::stdout(), shutdown)
        .await
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is the protocol channel; diagnostics must go to stderr.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
