//! Shared shape for mover worker Jobs: labels, owner reference, proxy env
//! passthrough, and the RCLONE_*-style "mount a Secret as env" convention.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvFromSource, EnvVar, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    SecretEnvSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::labels::OWNED;
use crate::mover::MoverContext;

/// Forwarded to every mover container so movers that shell out to tools
/// respecting the convention (rclone, restic, curl-based `external` movers)
/// work behind a proxy without each mover reinventing this.
fn proxy_env() -> Vec<EnvVar> {
    ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY", "http_proxy", "https_proxy", "no_proxy"]
        .iter()
        .filter_map(|var| {
            std::env::var(var).ok().map(|value| EnvVar {
                name: var.to_string(),
                value: Some(value),
                ..Default::default()
            })
        })
        .collect()
}

/// Build a single-container, run-to-completion Job for a mover, with the
/// data PVC mounted at `/data` and `env` appended after the standard proxy
/// variables.
pub fn build_job(
    cx: &MoverContext,
    job_name: &str,
    image: &str,
    command: Option<Vec<String>>,
    mut env: Vec<EnvVar>,
    env_from_secret: Option<&str>,
    privileged: bool,
) -> Job {
    let mut labels = standard_labels_for(cx);
    labels.insert(crate::labels::MOVER.to_string(), cx.owner_name.clone());

    let mut container_env = proxy_env();
    container_env.append(&mut env);

    let env_from = env_from_secret.map(|secret| {
        vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: secret.to_string(),
                optional: Some(false),
            }),
            ..Default::default()
        }]
    });

    let security_context = if privileged {
        Some(k8s_openapi::api::core::v1::SecurityContext {
            privileged: Some(true),
            ..Default::default()
        })
    } else {
        None
    };

    let container = Container {
        name: "mover".to_string(),
        image: Some(image.to_string()),
        command,
        env: Some(container_env),
        env_from,
        volume_mounts: Some(vec![VolumeMount {
            name: "data".to_string(),
            mount_path: "/data".to_string(),
            ..Default::default()
        }]),
        security_context,
        ..Default::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(job_name.to_string()),
            namespace: Some(cx.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(2),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    restart_policy: Some("OnFailure".to_string()),
                    service_account_name: Some(service_account_name(cx)),
                    volumes: Some(vec![Volume {
                        name: "data".to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: cx.data_pvc_name.clone(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

pub fn job_name(cx: &MoverContext) -> String {
    format!("volsync-{}-{}", if cx.is_source { "src" } else { "dst" }, cx.owner_name)
}

pub fn service_account_name(cx: &MoverContext) -> String {
    format!("volsync-{}-{}", if cx.is_source { "src" } else { "dst" }, cx.owner_name)
}

fn standard_labels_for(cx: &MoverContext) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        "app.kubernetes.io/name".to_string(),
        "volsync-mover".to_string(),
    );
    labels.insert(
        "app.kubernetes.io/instance".to_string(),
        cx.owner_name.clone(),
    );
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "volsync-operator".to_string(),
    );
    labels.insert(OWNED.to_string(), cx.owner_uid.clone());
    labels
}
