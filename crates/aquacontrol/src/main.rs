//! AquaControl core entry point.

use aquacontrol::{AppError, Application, Config, telemetry};
use event_store::EventStore;
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn run<S: EventStore + Clone + 'static>(app: Application<S>) -> Result<(), AppError> {
    // Replay any existing events into the read models.
    let events = app.catch_up().await?;
    tracing::info!(events, "read models caught up");

    app.run_retry_loop(shutdown_signal()).await;

    tracing::info!("shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    telemetry::init_tracing(&config)?;
    telemetry::install_metrics(config.metrics_addr)?;

    if config.database_url.is_some() {
        run(Application::postgres(config).await?).await
    } else {
        tracing::warn!("DATABASE_URL not set, running with an in-memory store");
        run(Application::in_memory(config)).await
    }
}
