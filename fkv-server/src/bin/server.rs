//! # Server Bootstrap
//!
//! Process entry point: load configuration, install logging, replay the
//! append-only log against a fresh store, start the background sweep, bind
//! the listener, and run until a shutdown signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fkv_common::{Config, ConfigError};
use fkv_engine::{Aol, Broker, Store};
use fkv_server::connection::Shared;
use fkv_server::eval::{self, Outcome};
use fkv_server::{listener, Metrics};

#[tokio::main]
async fn main() -> ExitCode {
    fkv_common::logging::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::UnknownTransport(transport)) => {
            tracing::error!(%transport, "unrecognized SERVER transport");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(Store::new());
    let broker = Arc::new(Broker::new());
    let replay_metrics = Metrics::new();

    if let Err(err) = Aol::replay(&config.aof_path, |line| {
        let tokens = fkv_server::tokenize(line);
        if tokens.is_empty() {
            return;
        }
        // Replay only re-applies writes; PUBLISH/SUBSCRIBE never reach the
        // log (see `eval::is_write_op`), so a plain Reply is always correct here.
        if let Outcome::Reply(reply) = eval::dispatch(&tokens, &store, &broker, &replay_metrics) {
            if reply.first() == Some(&b'-') {
                tracing::warn!(line = %String::from_utf8_lossy(line), "log entry replayed with error, skipping");
            }
        }
    }) {
        tracing::error!(error = %err, path = %config.aof_path, "failed to replay log");
        return ExitCode::FAILURE;
    }

    let aol = match Aol::open(&config.aof_path) {
        Ok(aol) => Arc::new(aol),
        Err(err) => {
            tracing::error!(error = %err, path = %config.aof_path, "failed to open log for append");
            return ExitCode::FAILURE;
        }
    };

    let janitor = fkv_engine::spawn_janitor(Arc::clone(&store), config.janitor_interval);

    let shared = Arc::new(Shared {
        store,
        broker,
        aol: Some(aol),
        metrics: Arc::new(Metrics::new()),
    });

    let shutdown = CancellationToken::new();
    let serve_shutdown = shutdown.clone();
    let bind_addr = config.bind_addr();

    let serve_task = tokio::spawn(async move {
        listener::serve(&bind_addr, shared, serve_shutdown).await
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();

    match serve_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::error!(error = %err, "listener exited with error");
            janitor.stop().await;
            return ExitCode::FAILURE;
        }
        Err(err) => {
            tracing::error!(error = %err, "listener task panicked");
            janitor.stop().await;
            return ExitCode::FAILURE;
        }
    }

    janitor.stop().await;
    tracing::info!("shutdown complete");
    ExitCode::SUCCESS
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
