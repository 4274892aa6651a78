//! Shared `VolumeSnapshot` create/bind helpers used by both the source
//! (copyMethod=Snapshot) and destination (image preservation) flows.

use k8s_openapi::api::core::v1::TypedLocalObjectReference as CoreTypedRef;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::Api;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::controller::resources::create_if_absent;
use crate::crd::snapshot::{VolumeSnapshot, VolumeSnapshotSource, VolumeSnapshotSpec};
use crate::error::{Error, Result};

/// Create a `VolumeSnapshot` of `pvc_name` named `name` if it doesn't
/// already exist. Idempotent: callers re-invoke this every reconcile until
/// the snapshot is bound.
pub async fn ensure_snapshot(
    api: &Api<VolumeSnapshot>,
    name: &str,
    namespace: &str,
    pvc_name: &str,
    volume_snapshot_class_name: Option<&str>,
    owner: OwnerReference,
    labels: BTreeMap<String, String>,
) -> Result<VolumeSnapshot> {
    let snapshot = VolumeSnapshot {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: VolumeSnapshotSpec {
            source: VolumeSnapshotSource {
                persistent_volume_claim_name: Some(pvc_name.to_string()),
                volume_snapshot_content_name: None,
            },
            volume_snapshot_class_name: volume_snapshot_class_name.map(str::to_string),
        },
        status: None,
    };
    create_if_absent(api, name, &snapshot).await
}

/// Fail with a transient `NotReady` until the snapshot is bound (spec
/// §4.C's `readyToUse` tri-state handling: absent is treated as ready,
/// explicit `false` keeps waiting).
pub fn require_bound(snapshot: &VolumeSnapshot) -> Result<()> {
    if snapshot.is_bound() {
        Ok(())
    } else {
        Err(Error::NotReady(format!(
            "VolumeSnapshot {} is not yet bound",
            snapshot.name_any()
        )))
    }
}

/// A `dataSourceRef` pointing at a bound `VolumeSnapshot`, for seeding a new
/// PVC from it.
pub fn as_data_source_ref(snapshot_name: &str) -> CoreTypedRef {
    CoreTypedRef {
        api_group: Some("snapshot.storage.k8s.io".to_string()),
        kind: "VolumeSnapshot".to_string(),
        name: snapshot_name.to_string(),
    }
}
