//! Tracing and Prometheus metrics setup.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::AppError;
use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` syntax is accepted in `config.log_level`.
pub fn init_tracing(config: &Config) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| AppError::Telemetry(format!("invalid log filter: {e}")))?;

    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .try_init()
        .map_err(|e| AppError::Telemetry(e.to_string()))
}

/// Installs the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn install_metrics(addr: SocketAddr) -> Result<(), AppError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Telemetry(e.to_string()))?;

    describe_metrics();
    tracing::info!(%addr, "metrics listener started");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "event_store_events_appended_total",
        "Events durably appended to the log"
    );
    metrics::describe_counter!(
        "event_store_conflicts_total",
        "Appends rejected by the optimistic concurrency check"
    );
    metrics::describe_counter!(
        "repository_command_retries_total",
        "Commands reloaded and retried after a conflict"
    );
    metrics::describe_counter!(
        "repository_snapshots_saved_total",
        "Aggregate snapshots written"
    );
    metrics::describe_counter!(
        "projections_events_processed",
        "Events applied to a read model"
    );
    metrics::describe_counter!(
        "projections_failures_total",
        "Projection deliveries that failed and were queued"
    );
    metrics::describe_gauge!(
        "projections_pending_retries",
        "Projection deliveries waiting to be retried"
    );
}
