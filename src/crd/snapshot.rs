//! Typed wrapper for the CSI `VolumeSnapshot`/`VolumeSnapshotContent`
//! resources (`snapshot.storage.k8s.io/v1`).
//!
//! The core never registers these CRDs — they're provided by the cluster's
//! CSI snapshot controller — it only needs a `kube::Resource` impl and
//! typed status access, so `#[derive(CustomResource)]` is used purely for
//! its codegen (the generated `.crd()` method is simply never called), the
//! same convention the teacher applies to its own owned types.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "snapshot.storage.k8s.io",
    version = "v1",
    kind = "VolumeSnapshot",
    namespaced,
    status = "VolumeSnapshotStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSpec {
    pub source: VolumeSnapshotSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_class_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_content_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_volume_snapshot_content_name: Option<String>,
    /// Absence is treated as "ignore" (neither ready nor not-ready); an
    /// explicit `false` means keep waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_to_use: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<VolumeSnapshotError>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VolumeSnapshot {
    /// Per spec §4.C: bound once `boundVolumeSnapshotContentName` is
    /// non-empty and `readyToUse` is not explicitly `false`.
    pub fn is_bound(&self) -> bool {
        let Some(status) = &self.status else {
            return false;
        };
        let has_content = status
            .bound_volume_snapshot_content_name
            .as_deref()
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        let not_explicitly_unready = status.ready_to_use != Some(false);
        has_content && not_explicitly_unready
    }

    pub fn restore_size(&self) -> Option<&str> {
        self.status.as_ref()?.restore_size.as_deref()
    }
}
