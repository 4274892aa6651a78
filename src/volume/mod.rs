//! Volume provisioning and point-in-time image lifecycle (spec §4.C).
//!
//! `source` resolves the PVC a mover reads from (direct/clone/snapshot of
//! the user's source PVC); `destination` resolves the PVC a mover writes to
//! and, after a successful sync, the durable image recorded on
//! `status.latestImage`.

pub mod destination;
pub mod snapshot;
pub mod source;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

use crate::crd::{VolumeMode, VolumeOptions};

/// Deterministic temporary-object name, `volsync-<role>-<CR-name>` (spec
/// §6 "Objects produced"). `role` is `"src"` or `"dst"`, matching
/// `mover::builder::job_name`'s convention for the worker Job itself.
pub fn pvc_name(role: &str, cr_name: &str) -> String {
    format!("volsync-{}-{}", role, cr_name)
}

/// Build a PVC spec from the common `VolumeOptions` knobs, optionally
/// seeded from a `dataSource`/`dataSourceRef` (clone or snapshot restore).
pub(crate) fn build_pvc(
    name: &str,
    namespace: &str,
    owner: OwnerReference,
    labels: BTreeMap<String, String>,
    options: &VolumeOptions,
    capacity_override: Option<&str>,
    data_source: Option<k8s_openapi::api::core::v1::TypedLocalObjectReference>,
) -> PersistentVolumeClaim {
    let capacity = capacity_override
        .map(|s| s.to_string())
        .or_else(|| options.capacity.clone())
        .unwrap_or_else(|| "1Gi".to_string());

    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(capacity));

    let volume_mode = options.volume_mode.unwrap_or(VolumeMode::Filesystem);

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(
                options
                    .access_modes
                    .clone()
                    .unwrap_or_else(|| vec!["ReadWriteOnce".to_string()]),
            ),
            storage_class_name: options.storage_class_name.clone(),
            volume_mode: Some(
                match volume_mode {
                    VolumeMode::Filesystem => "Filesystem",
                    VolumeMode::Block => "Block",
                }
                .to_string(),
            ),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            data_source_ref: data_source.clone(),
            data_source,
            ..Default::default()
        }),
        status: None,
    }
}

/// True once a PVC's `status.phase` is `Bound`.
pub(crate) fn pvc_is_bound(pvc: &PersistentVolumeClaim) -> bool {
    pvc.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|p| p == "Bound")
        .unwrap_or(false)
}

/// Last-resort size fallback: `status.capacity["storage"]`, then
/// `spec.resources.requests["storage"]` (spec.md §4.C's fallback chain
/// tail).
pub(crate) fn storage_request(pvc: &PersistentVolumeClaim) -> Option<String> {
    pvc.status
        .as_ref()
        .and_then(|s| s.capacity.as_ref())
        .and_then(|c| c.get("storage"))
        .map(|q| q.0.clone())
        .or_else(|| {
            pvc.spec
                .as_ref()
                .and_then(|s| s.resources.as_ref())
                .and_then(|r| r.requests.as_ref())
                .and_then(|r| r.get("storage"))
                .map(|q| q.0.clone())
        })
}
