//! OpenTelemetry initialization, enabled only when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set (see `main.rs`).

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::trace::{Config, Sampler};
use std::env;
use tracing_subscriber::{registry::LookupSpan, Layer};

/// Build the OTLP tracing layer and set it as the global tracer provider.
/// Resource attributes identify the service as `volsync-operator`.
pub fn init_telemetry<S>(_subscriber: &S) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    global::set_text_map_propagator(TraceContextPropagator::new());

    let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());

    let resource = Resource::new(vec![
        KeyValue::new("service.name", "volsync-operator"),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&otlp_endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            Config::default()
                .with_resource(resource)
                .with_sampler(Sampler::AlwaysOn),
        )
        .install_batch(runtime::Tokio)
        .expect("failed to install OTLP tracer");

    tracing_opentelemetry::layer().with_tracer(tracer).boxed()
}

/// Flush any batched spans on shutdown.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
