//! Data movers (spec §5): the pluggable worker Jobs that actually copy
//! bytes. The core never speaks a mover's wire protocol itself — it only
//! builds and watches the Job (and any Service/Secret the mover needs), and
//! leaves the payload transfer to the container image the mover spec names.

pub mod builder;
pub mod kinds;
pub mod logs;
pub mod registry;
pub mod session;

use async_trait::async_trait;
use kube::runtime::events::Recorder;
use kube::Client;

use crate::crd::MoverResult;
use crate::error::Result;

/// Everything a `Mover` needs to build and watch its Job, independent of
/// whether the owner is a `ReplicationSource` or `ReplicationDestination`.
pub struct MoverContext {
    pub client: Client,
    pub namespace: String,
    pub owner_name: String,
    pub owner_uid: String,
    pub owner_kind: &'static str,
    /// The PVC the mover reads from (source) or writes to (destination).
    pub data_pvc_name: String,
    pub is_source: bool,
    /// Whether the owning namespace carries
    /// `volsync.backube/privileged-movers: "true"` and this sync's volume
    /// mode needs it (spec §6 reserved annotations).
    pub privileged: bool,
    /// Scoped to the owning CR, for movers that need to report
    /// `ServiceAddressAssigned`/`NoServiceAddressAssigned` themselves.
    pub recorder: Recorder,
}

/// Outcome of polling a mover's Job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoverRunState {
    InProgress,
    Done(MoverResult),
}

/// A pluggable data mover. Implementations build Kubernetes objects; they
/// never execute a sync themselves.
#[async_trait]
pub trait Mover: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ensure ancillary objects (ServiceAccount, Secrets, a Service for
    /// inbound movers) exist before the worker Job is created. Idempotent.
    async fn prepare(&self, cx: &MoverContext) -> Result<()>;

    /// Create or update the worker Job and report its current state.
    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState>;

    /// Remove the worker Job (and anything `prepare` created that isn't
    /// swept by the generic cleanup label pass).
    async fn cleanup(&self, cx: &MoverContext) -> Result<()>;
}
