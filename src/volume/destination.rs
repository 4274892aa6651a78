//! Destination-side PVC provisioning and `latestImage` advancement
//! (spec §4.C "Destination side").

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;

use crate::controller::resources::{create_if_absent, FIELD_MANAGER};
use crate::crd::common::{get_annotation, TypedLocalObjectReference};
use crate::crd::snapshot::VolumeSnapshot;
use crate::crd::{CopyMethod, VolumeOptions};
use crate::error::{Error, Result};
use crate::labels::DESTINATION_SNAPSHOT_NAME;
use crate::volume::snapshot::{ensure_snapshot, require_bound};
use crate::volume::build_pvc;

/// Provision (or adopt) the destination PVC, without a `dataSource`: either
/// the user-named `destinationPVC` or a freshly created one from
/// `volumeOptions`. Validation (`ReplicationDestinationSpec::validate`)
/// already guarantees capacity/accessModes are present when no
/// `destinationPVC` name is given.
pub async fn ensure_new_pvc(
    client: &Client,
    namespace: &str,
    owner: OwnerReference,
    name: &str,
    options: &VolumeOptions,
    labels: BTreeMap<String, String>,
) -> Result<PersistentVolumeClaim> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), namespace);
    if let Some(existing_name) = &options.destination_pvc {
        return api.get(existing_name).await.map_err(Error::from);
    }
    let pvc = build_pvc(name, namespace, owner, labels, options, None, None);
    create_if_absent(&api, name, &pvc).await
}

/// Outcome of advancing `latestImage`: the new reference, and — when the
/// predecessor was a different, now-superseded snapshot — its name so the
/// caller can hand it to the cleanup manager (spec invariant: the previous
/// snapshot is marked for cleanup once its successor is bound, never
/// deleted here directly).
pub struct ImageAdvance {
    pub image: TypedLocalObjectReference,
    pub superseded_snapshot: Option<String>,
}

/// Advance `status.latestImage` after a successful mover run.
pub async fn ensure_image(
    client: &Client,
    namespace: &str,
    owner: OwnerReference,
    cr_name: &str,
    pvc: &PersistentVolumeClaim,
    copy_method: CopyMethod,
    volume_snapshot_class_name: Option<&str>,
    previous_image: Option<&TypedLocalObjectReference>,
    now: DateTime<Utc>,
    labels: BTreeMap<String, String>,
) -> Result<ImageAdvance> {
    match copy_method {
        CopyMethod::Direct => Ok(ImageAdvance {
            image: TypedLocalObjectReference::pvc(pvc.name_any()),
            superseded_snapshot: None,
        }),
        CopyMethod::None => unreachable!("canonicalize() never returns None"),
        CopyMethod::Clone => Err(Error::Validation(
            "copyMethod Clone is not valid on a ReplicationDestination".to_string(),
        )),
        CopyMethod::Snapshot => {
            let snap_name = adopt_snapshot_name(client, namespace, cr_name, pvc, now).await?;
            let snap_api: Api<VolumeSnapshot> = Api::namespaced(client.clone(), namespace);
            let snapshot = ensure_snapshot(
                &snap_api,
                &snap_name,
                namespace,
                &pvc.name_any(),
                volume_snapshot_class_name,
                owner,
                labels,
            )
            .await?;
            require_bound(&snapshot)?;

            let superseded_snapshot = match previous_image {
                Some(prev) if prev.kind == "VolumeSnapshot" && prev.name != snap_name => {
                    Some(prev.name.clone())
                }
                _ => None,
            };

            Ok(ImageAdvance {
                image: TypedLocalObjectReference::volume_snapshot(snap_name),
                superseded_snapshot,
            })
        }
    }
}

/// Create-or-adopt: the destination snapshot's name is stored as a PVC
/// annotation the first time it's needed, so repeated reconciliations
/// (including across retries after a mover failure) converge on the same
/// snapshot instead of minting a new timestamped name every pass.
async fn adopt_snapshot_name(
    client: &Client,
    namespace: &str,
    cr_name: &str,
    pvc: &PersistentVolumeClaim,
    now: DateTime<Utc>,
) -> Result<String> {
    if let Some(existing) = get_annotation(&pvc.metadata.annotations, DESTINATION_SNAPSHOT_NAME) {
        return Ok(existing.to_string());
    }

    let fresh = format!("{}-{}", cr_name, now.format("%Y%m%d%H%M%S"));

    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), namespace);
    let patch = serde_json::json!({
        "metadata": { "annotations": { DESTINATION_SNAPSHOT_NAME: fresh } }
    });
    api.patch(
        &pvc.name_any(),
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Merge(patch),
    )
    .await
    .map_err(Error::from)?;
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_advance_detects_superseded_snapshot() {
        let previous = TypedLocalObjectReference::volume_snapshot("dst-20250101000000");
        let new_name = "dst-20250101001500";
        let superseded = match Some(&previous) {
            Some(prev) if prev.kind == "VolumeSnapshot" && prev.name != new_name => {
                Some(prev.name.clone())
            }
            _ => None,
        };
        assert_eq!(superseded, Some("dst-20250101000000".to_string()));
    }

    #[test]
    fn image_advance_no_supersede_when_unchanged() {
        let previous = TypedLocalObjectReference::volume_snapshot("dst-same");
        let new_name = "dst-same";
        let superseded = match Some(&previous) {
            Some(prev) if prev.kind == "VolumeSnapshot" && prev.name != new_name => {
                Some(prev.name.clone())
            }
            _ => None,
        };
        assert_eq!(superseded, None);
    }
}
