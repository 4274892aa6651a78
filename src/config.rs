//! Operator-wide configuration (spec §9 "Global state": the only
//! process-wide mutable state is the SCC name, set once at startup and
//! read-only thereafter).

use clap::Parser;

/// Command-line / environment configuration for the `volsync-operator`
/// binary, following the teacher's `clap` derive + `env` convention.
#[derive(Parser, Clone, Debug)]
#[command(name = "volsync-operator", version, about = "VolSync reconciliation engine")]
pub struct OperatorConfig {
    /// Restrict watches to a single namespace; unset watches cluster-wide.
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Name of the SecurityContextConstraints granted to movers in
    /// namespaces carrying `volsync.backube/privileged-movers: "true"`
    /// (spec §9's process-wide read-only config).
    #[arg(long, env = "PRIVILEGED_MOVER_SCC", default_value = "volsync-privileged-mover")]
    pub privileged_mover_scc: String,

    /// Bind address for the health/readiness/metrics HTTP server.
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub metrics_bind_address: String,

    /// Max concurrent reconciles per controller, passed through to
    /// `kube_runtime::Controller`'s concurrency knob.
    #[arg(long, env = "MAX_CONCURRENT_RECONCILES", default_value_t = 4)]
    pub max_concurrent_reconciles: u16,
}

impl OperatorConfig {
    pub fn from_env() -> Self {
        Self::parse()
    }
}
