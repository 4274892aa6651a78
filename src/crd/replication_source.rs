//! `ReplicationSource` custom resource.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::exactly_one_mover;

use super::common::{Condition, CopyMethod, MoverStatus, Trigger};
use super::movers::{
    ExternalSpec, KopiaSpec, MoverKind, RcloneSpec, ResticSpec, RsyncSpec, RsyncTlsSpec,
    SyncthingSpec,
};

/// The `ReplicationSource` CRD: lives in the namespace that holds the live
/// volume and drives repeated point-in-time transfers out of it.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "volsync.backube",
    version = "v1alpha1",
    kind = "ReplicationSource",
    namespaced,
    status = "ReplicationSourceStatus",
    shortname = "rs",
    printcolumn = r#"{"name":"Last sync","type":"string","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Duration","type":"string","jsonPath":".status.lastSyncDuration"}"#,
    printcolumn = r#"{"name":"Next sync","type":"string","jsonPath":".status.nextSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationSourceSpec {
    /// Name of a PVC in the same namespace. Must exist before a sync begins.
    pub source_pvc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,

    /// No new sync is started while true; an in-flight one still completes.
    #[serde(default)]
    pub paused: bool,

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

impl ReplicationSourceSpec {
    /// Which mover kind is configured, or a validation error if the
    /// exactly-one-of invariant is violated.
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

    /// The effective `copyMethod`, with the deprecated `None` alias
    /// canonicalized to `Direct`.
    pub fn copy_method(&self) -> Result<CopyMethod, String> {
        let vo = self.volume_options()?;
        Ok(vo.copy_method.canonicalize())
    }

    /// Public accessor for the configured mover's `volumeOptions`, used by
    /// the controller once `mover_kind`/`validate` have already confirmed
    /// exactly one mover fragment is set.
    pub fn volume_options_ref(&self) -> Result<&super::common::VolumeOptions, String> {
        self.volume_options()
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

    /// Validate the whole spec: exactly-one mover, a parseable trigger, and
    /// copyMethod=Snapshot only pairing with a sensible
    /// volumeSnapshotClassName (the class itself is not validated here —
    /// that's the cluster's job at admission, this only rejects shapes that
    /// can never be satisfied).
    pub fn validate(&self) -> Result<(), String> {
        self.mover_kind()?;
        if let Some(trigger) = &self.trigger {
            if let Some(schedule) = &trigger.schedule {
                crate::trigger::cron::validate_5field(schedule)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationSourceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_start_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<Time>,
    /// Go-style duration string (e.g. "1m30s").
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
    /// Opaque mover-specific sub-status (e.g. rsync's `address`, the
    /// generated SSH key secret name). The core only preserves it.
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

    fn base_spec() -> ReplicationSourceSpec {
        ReplicationSourceSpec {
            source_pvc: "data-pvc".to_string(),
            trigger: None,
            paused: false,
            rsync: Some(RsyncSpec::default()),
            rsync_tls: None,
            rclone: None,
            restic: None,
            kopia: None,
            syncthing: None,
            external: None,
        }
    }

    #[test]
    fn mover_kind_requires_exactly_one() {
        let mut spec = base_spec();
        assert_eq!(spec.mover_kind().unwrap(), MoverKind::Rsync);

        spec.restic = Some(ResticSpec::default());
        assert!(spec.mover_kind().is_err());

        spec.rsync = None;
        spec.restic = None;
        assert!(spec.mover_kind().is_err());
    }

    #[test]
    fn copy_method_none_canonicalizes_to_direct() {
        let mut spec = base_spec();
        spec.rsync.as_mut().unwrap().volume_options.copy_method = CopyMethod::None;
        assert_eq!(spec.copy_method().unwrap(), CopyMethod::Direct);
    }

    #[test]
    fn validate_rejects_bad_cron() {
        let mut spec = base_spec();
        spec.trigger = Some(Trigger {
            schedule: Some("every-tuesday".to_string()),
            manual: None,
        });
        assert!(spec.validate().is_err());
    }

    #[test]
    fn validate_accepts_standard_cron() {
        let mut spec = base_spec();
        spec.trigger = Some(Trigger {
            schedule: Some("0 2 * * 2".to_string()),
            manual: None,
        });
        assert!(spec.validate().is_ok());
    }
}
