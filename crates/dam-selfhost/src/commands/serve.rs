use std::sync::Arc;

use anyhow::Context as _;
use dam_selfhost_runtime::{ExecutableSpawner, PredictionService};
use tokio::signal;

use crate::api;
use crate::cli::ServeArgs;
use crate::state::AppState;

pub async fn handle_command(args: ServeArgs, log_level: &str) -> anyhow::Result<()> {
    let config = args.service_config()?;
    let spawner = ExecutableSpawner::current_exe(args.worker_args(log_level))
        .context("failed to locate the server executable for prediction workers")?;

    log::info!(
        "Starting DAM self-hosted service: mock_mode={} preload_on_startup={} predict_timeout_s={} max_audio_s={} start_method={} max_concurrent_workers={}",
        config.mock_mode,
        config.preload_on_startup,
        config.prediction_timeout.as_secs_f64(),
        config.max_audio_seconds,
        config.start_mode,
        config.max_concurrent_workers
    );

    let service = PredictionService::new(
        config,
        Arc::new(args.pipeline.loader_config()),
        Arc::new(spawner),
    )?;
    service.preload().await;

    let app = api::create_router(AppState::new(service));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => log::info!("Received SIGTERM, shutting down..."),
    }
}
