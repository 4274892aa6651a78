//! Reserved annotation and label strings (spec §6), all under the
//! `volsync.backube/` prefix.

/// Label on a temporary object: UID of the owning CR. Presence authorizes
/// deletion by the cleanup manager.
pub const CLEANUP: &str = "volsync.backube/cleanup";

/// Label on a snapshot: opts it out of cleanup regardless of ownership.
pub const DO_NOT_DELETE: &str = "volsync.backube/do-not-delete";

/// Label on a core-created object: UID of the owning CR.
pub const OWNED: &str = "volsync.backube/owned";

/// Namespace-level annotation; `"true"` opts in to movers needing elevated
/// pod security.
pub const PRIVILEGED_MOVERS: &str = "volsync.backube/privileged-movers";

/// Source PVC annotation: opts the source into the copy-trigger protocol.
pub const USE_COPY_TRIGGER: &str = "volsync.backube/use-copy-trigger";
/// Source PVC annotation: the user-supplied fresh token.
pub const COPY_TRIGGER: &str = "volsync.backube/copy-trigger";
/// Source PVC annotation: the last token the engine has acted on.
pub const LATEST_COPY_TRIGGER: &str = "volsync.backube/latest-copy-trigger";
/// Source PVC annotation: `WaitingForTrigger | InProgress | Completed`.
pub const LATEST_COPY_STATUS: &str = "volsync.backube/latest-copy-status";
/// Source PVC annotation: RFC3339 timestamp of when waiting began.
pub const LATEST_COPY_TRIGGER_WAITING_SINCE: &str =
    "volsync.backube/latest-copy-trigger-waiting-since";

/// Standard `app.kubernetes.io` labels, applied alongside the reserved ones.
pub const APP_NAME: &str = "app.kubernetes.io/name";
pub const APP_INSTANCE: &str = "app.kubernetes.io/instance";
pub const APP_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "volsync-operator";

/// Values for `volsync.backube/latest-copy-status`.
pub mod copy_status {
    pub const WAITING_FOR_TRIGGER: &str = "WaitingForTrigger";
    pub const IN_PROGRESS: &str = "InProgress";
    pub const COMPLETED: &str = "Completed";
}

/// Event reason strings (spec §6).
pub mod event_reason {
    pub const TRANSFER_STARTED: &str = "TransferStarted";
    pub const TRANSFER_FAILED: &str = "TransferFailed";
    pub const VOLUME_SNAPSHOT_CREATED: &str = "VolumeSnapshotCreated";
    pub const VOLUME_SNAPSHOT_NOT_BOUND: &str = "VolumeSnapshotNotBound";
    pub const PVC_CREATED: &str = "PersistentVolumeClaimCreated";
    pub const PVC_NOT_BOUND: &str = "PersistentVolumeClaimNotBound";
    pub const SERVICE_ADDRESS_ASSIGNED: &str = "ServiceAddressAssigned";
    pub const NO_SERVICE_ADDRESS_ASSIGNED: &str = "NoServiceAddressAssigned";
}

/// Event action strings (spec §6).
pub mod event_action {
    pub const CREATE_MOVER: &str = "CreateMover";
    pub const DELETE_MOVER: &str = "DeleteMover";
    pub const CREATE_PVC: &str = "CreatePersistentVolumeClaim";
    pub const CREATE_VOLUME_SNAPSHOT: &str = "CreateVolumeSnapshot";
}

/// Annotation used by the volume handler to remember the name of a
/// create-or-adopt snapshot across reconciliations.
pub const DESTINATION_SNAPSHOT_NAME: &str = "volsync.backube/destination-snapshot-name";

/// Reconciler-private state (spec §9's "poll-and-requeue" design: the
/// mover session's current phase isn't part of the public status schema,
/// so it's carried across reconciliations as a CR annotation instead).
pub const SESSION_PHASE: &str = "volsync.backube/session-phase";
/// The in-flight sync's manual trigger token, carried from the reconcile
/// that started the sync through to the one that records
/// `status.lastManualSync` on completion.
pub const SESSION_MANUAL_TOKEN: &str = "volsync.backube/session-manual-token";
/// The in-flight sync's copy-trigger token, carried the same way.
pub const SESSION_COPY_TRIGGER_TOKEN: &str = "volsync.backube/session-copy-trigger-token";
/// Selector label on mover worker Pods/Jobs/Services, matching the
/// teacher's `app.kubernetes.io/instance`-style selector convention.
pub const MOVER: &str = "volsync.backube/mover";
