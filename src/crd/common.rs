//! Types shared between `ReplicationSource` and `ReplicationDestination`.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A sync trigger. `schedule` and `manual` are both optional and, contrary
/// to what a mutually-exclusive CRD validation would suggest, the core
/// tolerates both being set: `manual` takes precedence (see DESIGN.md, Open
/// Question (c)).
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// 5-field cron expression (or `@hourly`/`@daily`/... alias).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Opaque token; a sync runs once per distinct value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual: Option<String>,
}

/// Strategy used to produce a point-in-time image of a volume.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum CopyMethod {
    /// Deprecated alias for `Direct`; canonicalized on read.
    None,
    Direct,
    Clone,
    Snapshot,
}

impl CopyMethod {
    /// Canonicalize the deprecated `None` alias to `Direct` (spec Open
    /// Question (b)). Call this immediately after deserializing a spec.
    pub fn canonicalize(self) -> Self {
        match self {
            CopyMethod::None => CopyMethod::Direct,
            other => other,
        }
    }
}

impl Default for CopyMethod {
    fn default() -> Self {
        CopyMethod::Direct
    }
}

/// Filesystem vs. block device handling. The core never converts between
/// the two; it only infers the destination's mode from the source when the
/// destination doesn't set one explicitly.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum VolumeMode {
    Filesystem,
    Block,
}

impl Default for VolumeMode {
    fn default() -> Self {
        VolumeMode::Filesystem
    }
}

/// Common volume-provisioning knobs shared by every mover's CR fragment.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeOptions {
    #[serde(default)]
    pub copy_method: CopyMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_modes: Option<Vec<String>>,
    /// Only meaningful when `copy_method == Snapshot`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_mode: Option<VolumeMode>,
    /// Name of an existing PVC to use instead of provisioning one
    /// (destination-only; meaningless on a source).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_pvc: Option<String>,
}

/// Terminal result of one mover run.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum MoverResult {
    Successful,
    Failed,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoverStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MoverResult>,
    /// Filtered tail, at most 100 lines, newline-joined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

/// Standard Kubernetes-shaped condition.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// The `Synchronizing` condition type name and its allowed reasons.
pub const CONDITION_SYNCHRONIZING: &str = "Synchronizing";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynchronizingReason {
    SyncInProgress,
    WaitingForSchedule,
    WaitingForManual,
    CleaningUp,
    Error,
}

impl SynchronizingReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SynchronizingReason::SyncInProgress => "SyncInProgress",
            SynchronizingReason::WaitingForSchedule => "WaitingForSchedule",
            SynchronizingReason::WaitingForManual => "WaitingForManual",
            SynchronizingReason::CleaningUp => "CleaningUp",
            SynchronizingReason::Error => "Error",
        }
    }
}

/// A reference to an object within the same namespace, typed by kind.
/// Used for `status.latestImage`.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypedLocalObjectReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub kind: String,
    pub name: String,
}

impl TypedLocalObjectReference {
    pub fn pvc(name: impl Into<String>) -> Self {
        Self {
            api_group: None,
            kind: "PersistentVolumeClaim".to_string(),
            name: name.into(),
        }
    }

    pub fn volume_snapshot(name: impl Into<String>) -> Self {
        Self {
            api_group: Some("snapshot.storage.k8s.io".to_string()),
            kind: "VolumeSnapshot".to_string(),
            name: name.into(),
        }
    }
}

/// Helper used by status builders to insert/update a condition in place,
/// keyed by `type`.
pub fn upsert_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: SynchronizingReason,
    message: impl Into<String>,
    observed_generation: Option<i64>,
) {
    let message = message.into();
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        let changed = existing.status != status || existing.reason != reason.as_str();
        existing.status = status;
        existing.reason = reason.as_str().to_string();
        existing.message = message;
        existing.observed_generation = observed_generation;
        if changed {
            existing.last_transition_time = Some(Time(chrono::Utc::now()));
        }
    } else {
        conditions.push(Condition {
            type_: type_.to_string(),
            status,
            reason: reason.as_str().to_string(),
            message,
            last_transition_time: Some(Time(chrono::Utc::now())),
            observed_generation,
        });
    }
}

/// Annotation bag convenience: fetch a string annotation from a metadata map.
pub fn get_annotation<'a>(annotations: &'a Option<BTreeMap<String, String>>, key: &str) -> Option<&'a str> {
    annotations.as_ref()?.get(key).map(|s| s.as_str())
}
