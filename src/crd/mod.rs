//! Custom Resource Definitions for VolSync.
//!
//! `ReplicationSource`/`ReplicationDestination` are the two user-facing
//! kinds; `VolumeSnapshot` is a typed read/write handle onto a foreign CRD
//! the core consumes but does not own.

pub mod common;
pub mod movers;
pub mod replication_destination;
pub mod replication_source;
pub mod snapshot;

pub use common::{
    get_annotation, upsert_condition, Condition, ConditionStatus, CopyMethod, MoverResult,
    MoverStatus, SynchronizingReason, Trigger, TypedLocalObjectReference, VolumeMode,
    VolumeOptions, CONDITION_SYNCHRONIZING,
};
pub use movers::{
    ExternalSpec, KopiaSpec, MoverKind, RcloneSpec, ResticRetainPolicy, ResticSpec, RsyncSpec,
    RsyncTlsSpec, SyncthingPeer, SyncthingSpec,
};
pub use replication_destination::{
    ReplicationDestination, ReplicationDestinationSpec, ReplicationDestinationStatus,
};
pub use replication_source::{ReplicationSource, ReplicationSourceSpec, ReplicationSourceStatus};
pub use snapshot::{VolumeSnapshot, VolumeSnapshotSource, VolumeSnapshotSpec, VolumeSnapshotStatus};
