//! VolSync operator entry point.
//!
//! Starts both `ReplicationSource`/`ReplicationDestination` controllers and,
//! when the `metrics-server` feature is enabled, the health/readiness/
//! metrics HTTP server alongside them.

use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use volsync_core::config::OperatorConfig;
use volsync_core::{controller, telemetry, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = OperatorConfig::from_env();

    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let fmt_layer = fmt::layer().with_target(true).json();

    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    let otel_enabled = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();
    if otel_enabled {
        let otel_layer = telemetry::init_telemetry(&registry);
        registry.with(otel_layer).init();
        info!("OpenTelemetry tracing initialized");
    } else {
        registry.init();
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting volsync-operator");

    let client = kube::Client::try_default().await.map_err(Error::Kube)?;
    info!("connected to Kubernetes cluster");

    if let Some(namespace) = &config.namespace {
        info!(namespace, "restricting watches to a single namespace");
    }

    let state = Arc::new(controller::ControllerState {
        client,
        config: config.clone(),
    });

    #[cfg(feature = "metrics-server")]
    {
        let bind_address = config.metrics_bind_address.clone();
        tokio::spawn(async move {
            if let Err(e) = volsync_core::server::run(&bind_address).await {
                tracing::error!(error = %e, "health/metrics server exited");
            }
        });
    }

    let result = controller::run(state).await;

    telemetry::shutdown_telemetry();

    result
}
