//! Prometheus metrics (spec §9 ambient stack), mirroring the teacher's
//! `controller::metrics` module: a global `Registry` of `Family<Labels,
//! Gauge>` updated from the reconcile loop.

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CrLabels {
    pub namespace: String,
    pub name: String,
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MoverResultLabels {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub result: String,
}

/// Unix timestamp (seconds) of the last completed sync, per CR.
pub static LAST_SYNC_TIMESTAMP: Lazy<Family<CrLabels, Gauge>> = Lazy::new(Family::default);

/// Duration in seconds of the most recent sync, per CR.
pub static LAST_SYNC_DURATION_SECONDS: Lazy<Family<CrLabels, Gauge<f64, std::sync::atomic::AtomicU64>>> =
    Lazy::new(Family::default);

/// Total reconciliations processed, per CR.
pub static RECONCILE_COUNT: Lazy<Family<CrLabels, Counter>> = Lazy::new(Family::default);

/// Total mover runs, partitioned by terminal result.
pub static MOVER_RESULT_COUNT: Lazy<Family<MoverResultLabels, Counter>> = Lazy::new(Family::default);

pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();
    registry.register(
        "volsync_last_sync_timestamp_seconds",
        "Unix timestamp of the last completed sync",
        LAST_SYNC_TIMESTAMP.clone(),
    );
    registry.register(
        "volsync_last_sync_duration_seconds",
        "Duration of the most recently completed sync",
        LAST_SYNC_DURATION_SECONDS.clone(),
    );
    registry.register(
        "volsync_reconcile_total",
        "Total reconciliations processed",
        RECONCILE_COUNT.clone(),
    );
    registry.register(
        "volsync_mover_result_total",
        "Total mover runs by terminal result",
        MOVER_RESULT_COUNT.clone(),
    );
    registry
});

pub fn record_reconcile(namespace: &str, name: &str, kind: &str) {
    RECONCILE_COUNT
        .get_or_create(&CrLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
        })
        .inc();
}

pub fn record_sync_completed(namespace: &str, name: &str, kind: &str, duration_secs: f64, timestamp: i64) {
    let labels = CrLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
        kind: kind.to_string(),
    };
    LAST_SYNC_TIMESTAMP.get_or_create(&labels).set(timestamp);
    LAST_SYNC_DURATION_SECONDS.get_or_create(&labels).set(duration_secs);
}

pub fn record_mover_result(namespace: &str, name: &str, kind: &str, result: &str) {
    MOVER_RESULT_COUNT
        .get_or_create(&MoverResultLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            result: result.to_string(),
        })
        .inc();
}

/// Render the registry in Prometheus text exposition format.
pub fn encode() -> String {
    let mut buf = String::new();
    prometheus_client::encoding::text::encode(&mut buf, &REGISTRY).expect("metrics encoding is infallible");
    buf
}
