//! Source-side PiT image materialization (spec §4.C "Source side").
//!
//! `ensure_pvc_from_src` dispatches on `copyMethod` exactly as spec.md
//! describes: Direct hands back the source PVC unchanged, Clone/Snapshot
//! provision a temporary PVC whose `dataSource` seeds it from the source.

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::Api;
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;

use crate::crd::{CopyMethod, VolumeOptions};
use crate::error::{Error, Result};
use crate::volume::snapshot::{as_data_source_ref, ensure_snapshot, require_bound};
use crate::volume::{build_pvc, storage_request};

/// Deterministic name for the source-side snapshot: `<CR-name>-src`.
pub fn source_snapshot_name(cr_name: &str) -> String {
    format!("{}-src", cr_name)
}

/// Resolve the PVC a mover should read from.
///
/// `temp_name` is the caller-computed deterministic name
/// (`volsync-src-<CR-name>`) used for the Clone/Snapshot-restore temporary
/// PVC; it is ignored for `Direct`. Returns `Error::NotReady` for the cases
/// spec.md says to "return nil and requeue": a Clone source mid-deletion,
/// or a source-side snapshot not yet bound.
pub async fn ensure_pvc_from_src(
    client: &Client,
    namespace: &str,
    owner: OwnerReference,
    cr_name: &str,
    temp_name: &str,
    src: &PersistentVolumeClaim,
    options: &VolumeOptions,
    labels: BTreeMap<String, String>,
) -> Result<PersistentVolumeClaim> {
    match options.copy_method.canonicalize() {
        CopyMethod::Direct => Ok(src.clone()),
        CopyMethod::None => unreachable!("canonicalize() never returns None"),
        CopyMethod::Clone => ensure_clone(client, namespace, owner, temp_name, src, options, labels).await,
        CopyMethod::Snapshot => {
            ensure_snapshot_restore(client, namespace, owner, cr_name, temp_name, src, options, labels).await
        }
    }
}

async fn ensure_clone(
    client: &Client,
    namespace: &str,
    owner: OwnerReference,
    temp_name: &str,
    src: &PersistentVolumeClaim,
    options: &VolumeOptions,
    labels: BTreeMap<String, String>,
) -> Result<PersistentVolumeClaim> {
    if src.metadata.deletion_timestamp.is_some() {
        return Err(Error::NotReady(format!(
            "source PVC {} is being deleted",
            src.name_any()
        )));
    }

    let capacity = options
        .capacity
        .clone()
        .or_else(|| storage_request(src))
        .ok_or_else(|| Error::Validation("could not determine clone capacity".to_string()))?;

    let data_source = k8s_openapi::api::core::v1::TypedLocalObjectReference {
        api_group: None,
        kind: "PersistentVolumeClaim".to_string(),
        name: src.name_any(),
    };

    let mut effective = options.clone();
    effective.capacity = Some(capacity.clone());
    effective.storage_class_name = options
        .storage_class_name
        .clone()
        .or_else(|| src.spec.as_ref().and_then(|s| s.storage_class_name.clone()));
    effective.access_modes = options
        .access_modes
        .clone()
        .or_else(|| src.spec.as_ref().and_then(|s| s.access_modes.clone()));
    effective.volume_mode = effective.volume_mode.or_else(|| infer_volume_mode(src));

    let pvc = build_pvc(
        temp_name,
        namespace,
        owner,
        labels,
        &effective,
        Some(&capacity),
        Some(data_source),
    );
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), namespace);
    crate::controller::resources::create_if_absent(&api, temp_name, &pvc).await
}

/// When `volumeMode` is absent on the handler options, infer it from the
/// source PVC (spec §4.C) rather than falling back to the `Filesystem`
/// default that applies when there is no source to consult.
fn infer_volume_mode(src: &PersistentVolumeClaim) -> Option<crate::crd::VolumeMode> {
    match src.spec.as_ref()?.volume_mode.as_deref()? {
        "Block" => Some(crate::crd::VolumeMode::Block),
        _ => Some(crate::crd::VolumeMode::Filesystem),
    }
}

async fn ensure_snapshot_restore(
    client: &Client,
    namespace: &str,
    owner: OwnerReference,
    cr_name: &str,
    temp_name: &str,
    src: &PersistentVolumeClaim,
    options: &VolumeOptions,
    labels: BTreeMap<String, String>,
) -> Result<PersistentVolumeClaim> {
    let snap_name = source_snapshot_name(cr_name);
    let snap_api: Api<crate::crd::snapshot::VolumeSnapshot> = Api::namespaced(client.clone(), namespace);
    let snapshot = ensure_snapshot(
        &snap_api,
        &snap_name,
        namespace,
        &src.name_any(),
        options.volume_snapshot_class_name.as_deref(),
        owner.clone(),
        labels.clone(),
    )
    .await?;
    require_bound(&snapshot)?;

    let capacity = options
        .capacity
        .clone()
        .or_else(|| snapshot.restore_size().map(str::to_string))
        .or_else(|| storage_request(src))
        .ok_or_else(|| Error::Validation("could not determine restore capacity".to_string()))?;

    let mut effective = options.clone();
    effective.capacity = Some(capacity.clone());
    effective.volume_mode = effective.volume_mode.or_else(|| infer_volume_mode(src));

    let pvc = build_pvc(
        temp_name,
        namespace,
        owner,
        labels,
        &effective,
        Some(&capacity),
        Some(as_data_source_ref(&snap_name)),
    );
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), namespace);
    crate::controller::resources::create_if_absent(&api, temp_name, &pvc).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_snapshot_name_is_deterministic() {
        assert_eq!(source_snapshot_name("my-source"), "my-source-src");
    }
}
