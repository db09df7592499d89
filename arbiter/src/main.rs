#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod engine;
mod repl;
mod report;

use anyhow::bail;
use arbiter_config::Config;
use arbiter_routing::{AnswerRequest, Outcome};
use args::{Args, Command};
use clap::Parser;
use engine::Engine;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let log_filter = config
        .telemetry
        .as_ref()
        .map_or("info", |telemetry| telemetry.log_filter.as_str());
    let telemetry_guard = arbiter_telemetry::init(config.telemetry.as_ref(), log_filter)?;

    tracing::info!(
        config_path = %args.config.display(),
        mode = %config.mode,
        exporting = telemetry_guard.is_exporting(),
        "starting arbiter"
    );

    let engine = Engine::new(&config)?;

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    match args.command {
        Command::Ask {
            question,
            context,
            mode,
            score,
        } => {
            let request = AnswerRequest::new(question, mode.unwrap_or(engine.mode())).with_context(context);
            let outcome = engine.ask(request, &shutdown).await?;

            match outcome {
                Outcome::Answer { text, score: breakdown, .. } => {
                    println!("{text}");
                    if score {
                        println!("{}", report::score(&breakdown));
                    }
                }
                Outcome::NoUsableResponse { backend, reason } => {
                    bail!("no usable response from {backend}: {reason}")
                }
            }
        }
        Command::Repl { mode } => {
            repl::run(&engine, mode.unwrap_or(engine.mode()), &shutdown).await?;
        }
    }

    tracing::info!("arbiter stopped");
    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
