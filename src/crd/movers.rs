//! Mover-specific configuration fragments.
//!
//! Mirrors the teacher's exactly-one-of pattern for per-node-type config
//! (`StellarNodeSpec::validator_config` / `horizon_config` / `soroban_config`):
//! each mover kind is an `Option<...Spec>` field on the CR spec and
//! `validate_exactly_one_mover` enforces that exactly one is set.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::VolumeOptions;

/// Discriminant used to dispatch to a concrete `Mover` implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoverKind {
    Rsync,
    RsyncTls,
    Rclone,
    Restic,
    Kopia,
    Syncthing,
    External,
}

impl MoverKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MoverKind::Rsync => "rsync",
            MoverKind::RsyncTls => "rsyncTLS",
            MoverKind::Rclone => "rclone",
            MoverKind::Restic => "restic",
            MoverKind::Kopia => "kopia",
            MoverKind::Syncthing => "syncthing",
            MoverKind::External => "external",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RsyncSpec {
    #[serde(flatten)]
    pub volume_options: VolumeOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_keys: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RsyncTlsSpec {
    #[serde(flatten)]
    pub volume_options: VolumeOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_secret: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RcloneSpec {
    #[serde(flatten)]
    pub volume_options: VolumeOptions,
    pub rclone_config: String,
    pub rclone_dest_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rclone_config_section: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResticSpec {
    #[serde(flatten)]
    pub volume_options: VolumeOptions,
    pub repository: String,
    #[serde(default)]
    pub retain: Option<ResticRetainPolicy>,
    #[serde(default)]
    pub prune_interval_days: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResticRetainPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KopiaSpec {
    #[serde(flatten)]
    pub volume_options: VolumeOptions,
    pub repository: String,
    #[serde(default)]
    pub source_path_override: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncthingSpec {
    #[serde(flatten)]
    pub volume_options: VolumeOptions,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub peers: Vec<SyncthingPeer>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncthingPeer {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub introducer: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSpec {
    #[serde(flatten)]
    pub volume_options: VolumeOptions,
    pub provider: String,
    #[serde(default)]
    pub parameters: std::collections::BTreeMap<String, String>,
}

/// Inspects which mover field is set and returns its `MoverKind`, or a
/// validation error if zero or more than one is set.
#[macro_export]
macro_rules! exactly_one_mover {
    ($spec:expr => $($field:ident = $kind:expr),+ $(,)?) => {{
        let mut set: Vec<$crate::crd::movers::MoverKind> = Vec::new();
        $(if $spec.$field.is_some() { set.push($kind); })+
        match set.len() {
            1 => Ok(set[0]),
            0 => Err("exactly one mover configuration must be set".to_string()),
            _ => Err(format!(
                "exactly one mover configuration must be set, found {}",
                set.len()
            )),
        }
    }};
}
