//! `ReplicationDestination` custom resource.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::exactly_one_mover;

use super::common::{Condition, CopyMethod, MoverStatus, Trigger, TypedLocalObjectReference};
use super::movers::{
    ExternalSpec, KopiaSpec, MoverKind, RcloneSpec, ResticSpec, RsyncSpec, RsyncTlsSpec,
    SyncthingSpec,
};

/// The `ReplicationDestination` CRD: lives in the target namespace and
/// materializes a destination PVC from the latest synchronized image.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "volsync.backube",
    version = "v1alpha1",
    kind = "ReplicationDestination",
    namespaced,
    status = "ReplicationDestinationStatus",
    shortname = "rd",
    printcolumn = r#"{"name":"Last sync","type":"string","jsonPath":".status.lastSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationDestinationSpec {
    /// No new sync is started while true; an in-flight one still completes.
    #[serde(default)]
    pub paused: bool,

    /// Pull-based movers (restic, kopia, rclone) can run on a destination
    /// schedule of their own rather than waiting on the source to push;
    /// same shape and evaluation as `ReplicationSourceSpec.trigger`
    /// (DESIGN.md resolves this as the "mirrors the source shape" reading
    /// of spec.md §3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsync: Option<RsyncSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "rsyncTLS")]
    pub rsync_tls: Option<RsyncTlsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rclone: Option<RcloneSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restic: Option<ResticSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kopia: Option<KopiaSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syncthing: Option<SyncthingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalSpec>,
}

impl ReplicationDestinationSpec {
    pub fn mover_kind(&self) -> Result<MoverKind, String> {
        exactly_one_mover!(self =>
            rsync = MoverKind::Rsync,
            rsync_tls = MoverKind::RsyncTls,
            rclone = MoverKind::Rclone,
            restic = MoverKind::Restic,
            kopia = MoverKind::Kopia,
            syncthing = MoverKind::Syncthing,
            external = MoverKind::External,
        )
    }

    fn volume_options(&self) -> Result<&super::common::VolumeOptions, String> {
        if let Some(r) = &self.rsync {
            return Ok(&r.volume_options);
        }
        if let Some(r) = &self.rsync_tls {
            return Ok(&r.volume_options);
        }
        if let Some(r) = &self.rclone {
            return Ok(&r.volume_options);
        }
        if let Some(r) = &self.restic {
            return Ok(&r.volume_options);
        }
        if let Some(r) = &self.kopia {
            return Ok(&r.volume_options);
        }
        if let Some(r) = &self.syncthing {
            return Ok(&r.volume_options);
        }
        if let Some(r) = &self.external {
            return Ok(&r.volume_options);
        }
        Err("no mover configuration set".to_string())
    }

    /// `copyMethod` restricted to {Direct, Snapshot} (Clone is not
    /// meaningful at a destination).
    pub fn copy_method(&self) -> Result<CopyMethod, String> {
        let vo = self.volume_options()?;
        match vo.copy_method.canonicalize() {
            CopyMethod::Clone => {
                Err("copyMethod Clone is not valid on a ReplicationDestination".to_string())
            }
            other => Ok(other),
        }
    }

    pub fn volume_options_ref(&self) -> Result<&super::common::VolumeOptions, String> {
        self.volume_options()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.mover_kind()?;
        self.copy_method()?;
        let vo = self.volume_options()?;
        if vo.destination_pvc.is_none() {
            if vo.capacity.is_none() {
                return Err("capacity is required when destinationPVC is not set".to_string());
            }
            if vo.access_modes.as_ref().map(|m| m.is_empty()).unwrap_or(true) {
                return Err("accessModes is required when destinationPVC is not set".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationDestinationStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_start_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_sync_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_manual_sync: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_mover_status: Option<MoverStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// The most recently completed PiT image. Advances only on successful
    /// sync completion; never points at an in-progress snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<TypedLocalObjectReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsync: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "rsyncTLS")]
    pub rsync_tls: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rclone: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restic: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kopia: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syncthing: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::common::VolumeOptions;

    fn base_spec() -> ReplicationDestinationSpec {
        ReplicationDestinationSpec {
            paused: false,
            trigger: None,
            rsync: Some(RsyncSpec {
                volume_options: VolumeOptions {
                    capacity: Some("5Gi".to_string()),
                    access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                    ..Default::default()
                },
                ..Default::default()
            }),
            rsync_tls: None,
            rclone: None,
            restic: None,
            kopia: None,
            syncthing: None,
            external: None,
        }
    }

    #[test]
    fn clone_copy_method_rejected() {
        let mut spec = base_spec();
        spec.rsync.as_mut().unwrap().volume_options.copy_method = CopyMethod::Clone;
        assert!(spec.copy_method().is_err());
    }

    #[test]
    fn missing_capacity_without_destination_pvc_fails_validation() {
        let mut spec = base_spec();
        spec.rsync.as_mut().unwrap().volume_options.capacity = None;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn destination_pvc_set_skips_capacity_requirement() {
        let mut spec = base_spec();
        let vo = &mut spec.rsync.as_mut().unwrap().volume_options;
        vo.capacity = None;
        vo.access_modes = None;
        vo.destination_pvc = Some("existing-pvc".to_string());
        assert!(spec.validate().is_ok());
    }
}
