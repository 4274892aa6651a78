//! Concrete `Mover` implementations. Each one builds the Job (and, where
//! needed, the Service or Secret) for its protocol; none of them implement
//! the wire protocol itself — that lives in the mover container image named
//! by `image`.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{EnvVar, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::Api;

use crate::controller::events;
use crate::controller::resources::{create_if_absent, create_or_update_or_recreate};
use crate::crd::{
    ExternalSpec, KopiaSpec, RcloneSpec, ResticSpec, RsyncSpec, RsyncTlsSpec, SyncthingSpec,
};
use crate::error::Result;
use crate::labels::{event_action, event_reason};
use crate::mover::builder::{build_job, job_name};
use crate::mover::logs::job_result;
use crate::mover::{Mover, MoverContext, MoverRunState};

/// The routable address of a just-applied Service, if one is assigned yet.
/// `ClusterIP` services get one synchronously; `LoadBalancer` services need
/// a later reconcile once the cloud provider's ingress populates.
fn service_address(svc: &Service) -> Option<String> {
    if let Some(ingress) = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|i| i.first())
    {
        return ingress.hostname.clone().or_else(|| ingress.ip.clone());
    }
    svc.spec
        .as_ref()
        .and_then(|s| s.cluster_ip.clone())
        .filter(|ip| !ip.is_empty() && ip != "None")
}

/// Emit `ServiceAddressAssigned`/`NoServiceAddressAssigned` (spec §6) for a
/// destination-side Service once it's been applied.
async fn report_service_address(cx: &MoverContext, svc: &Service) {
    let name = svc.metadata.name.clone().unwrap_or_default();
    match service_address(svc) {
        Some(address) => {
            events::normal(
                &cx.recorder,
                event_reason::SERVICE_ADDRESS_ASSIGNED,
                event_action::CREATE_MOVER,
                format!("service {} has address {}", name, address),
            )
            .await
            .ok();
        }
        None => {
            events::warning(
                &cx.recorder,
                event_reason::NO_SERVICE_ADDRESS_ASSIGNED,
                event_action::CREATE_MOVER,
                format!("waiting for an address to be assigned to service {}", name),
            )
            .await
            .ok();
        }
    }
}

const DEFAULT_RSYNC_IMAGE: &str = "quay.io/backube/volsync-mover-rsync:latest";
const DEFAULT_RSYNC_TLS_IMAGE: &str = "quay.io/backube/volsync-mover-rsync-tls:latest";
const DEFAULT_RCLONE_IMAGE: &str = "quay.io/backube/volsync-mover-rclone:latest";
const DEFAULT_RESTIC_IMAGE: &str = "quay.io/backube/volsync-mover-restic:latest";
const DEFAULT_KOPIA_IMAGE: &str = "quay.io/backube/volsync-mover-kopia:latest";
const DEFAULT_SYNCTHING_IMAGE: &str = "quay.io/backube/volsync-mover-syncthing:latest";

async fn run_job(cx: &MoverContext, job: &Job) -> Result<MoverRunState> {
    let api: Api<Job> = Api::namespaced(cx.client.clone(), &cx.namespace);
    let name = job.metadata.name.clone().unwrap();
    create_or_update_or_recreate(&api, &name, job).await?;
    match job_result(&cx.client, &cx.namespace, &name).await? {
        Some(result) => Ok(MoverRunState::Done(result)),
        None => Ok(MoverRunState::InProgress),
    }
}

async fn delete_job(cx: &MoverContext) -> Result<()> {
    let api: Api<Job> = Api::namespaced(cx.client.clone(), &cx.namespace);
    let name = job_name(cx);
    match api
        .delete(&name, &kube::api::DeleteParams::background())
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub struct RsyncMover {
    pub spec: RsyncSpec,
}

#[async_trait]
impl Mover for RsyncMover {
    fn name(&self) -> &'static str {
        "rsync"
    }

    async fn prepare(&self, cx: &MoverContext) -> Result<()> {
        if !cx.is_source {
            // Destination listens; expose it via a ClusterIP Service so the
            // source's rsync client has an address to dial.
            let svc_api: Api<Service> = Api::namespaced(cx.client.clone(), &cx.namespace);
            let name = job_name(cx);
            let service = Service {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    namespace: Some(cx.namespace.clone()),
                    ..Default::default()
                },
                spec: Some(ServiceSpec {
                    type_: self.spec.service_type.clone().or(Some("ClusterIP".to_string())),
                    selector: Some(std::collections::BTreeMap::from([(
                        crate::labels::MOVER.to_string(),
                        cx.owner_name.clone(),
                    )])),
                    ports: Some(vec![ServicePort {
                        port: self.spec.port.unwrap_or(22),
                        target_port: Some(IntOrString::Int(8022)),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                status: None,
            };
            let applied = create_if_absent(&svc_api, &name, &service).await?;
            report_service_address(cx, &applied).await;
        }
        Ok(())
    }

    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState> {
        let mut env = vec![];
        if let Some(address) = &self.spec.address {
            env.push(EnvVar {
                name: "DESTINATION_ADDRESS".to_string(),
                value: Some(address.clone()),
                ..Default::default()
            });
        }
        env.push(EnvVar {
            name: "DIRECTION".to_string(),
            value: Some(if cx.is_source { "source" } else { "destination" }.to_string()),
            ..Default::default()
        });
        let job = build_job(
            cx,
            &job_name(cx),
            DEFAULT_RSYNC_IMAGE,
            None,
            env,
            self.spec.ssh_keys.as_deref(),
            cx.privileged,
        );
        run_job(cx, &job).await
    }

    async fn cleanup(&self, cx: &MoverContext) -> Result<()> {
        delete_job(cx).await
    }
}

pub struct RsyncTlsMover {
    pub spec: RsyncTlsSpec,
}

#[async_trait]
impl Mover for RsyncTlsMover {
    fn name(&self) -> &'static str {
        "rsyncTLS"
    }

    async fn prepare(&self, cx: &MoverContext) -> Result<()> {
        if !cx.is_source {
            let svc_api: Api<Service> = Api::namespaced(cx.client.clone(), &cx.namespace);
            let name = job_name(cx);
            let service = Service {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    namespace: Some(cx.namespace.clone()),
                    ..Default::default()
                },
                spec: Some(ServiceSpec {
                    type_: self.spec.service_type.clone().or(Some("ClusterIP".to_string())),
                    selector: Some(std::collections::BTreeMap::from([(
                        crate::labels::MOVER.to_string(),
                        cx.owner_name.clone(),
                    )])),
                    ports: Some(vec![ServicePort {
                        port: self.spec.port.unwrap_or(8000),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                status: None,
            };
            let applied = create_if_absent(&svc_api, &name, &service).await?;
            report_service_address(cx, &applied).await;
        }
        Ok(())
    }

    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState> {
        let job = build_job(
            cx,
            &job_name(cx),
            DEFAULT_RSYNC_TLS_IMAGE,
            None,
            vec![],
            self.spec.key_secret.as_deref(),
            cx.privileged,
        );
        run_job(cx, &job).await
    }

    async fn cleanup(&self, cx: &MoverContext) -> Result<()> {
        delete_job(cx).await
    }
}

pub struct RcloneMover {
    pub spec: RcloneSpec,
}

#[async_trait]
impl Mover for RcloneMover {
    fn name(&self) -> &'static str {
        "rclone"
    }

    async fn prepare(&self, _cx: &MoverContext) -> Result<()> {
        Ok(())
    }

    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState> {
        let env = vec![
            EnvVar {
                name: "RCLONE_DEST_PATH".to_string(),
                value: Some(self.spec.rclone_dest_path.clone()),
                ..Default::default()
            },
            EnvVar {
                name: "RCLONE_CONFIG_SECTION".to_string(),
                value: self.spec.rclone_config_section.clone(),
                ..Default::default()
            },
        ];
        let job = build_job(
            cx,
            &job_name(cx),
            DEFAULT_RCLONE_IMAGE,
            None,
            env,
            Some(&self.spec.rclone_config),
            cx.privileged,
        );
        run_job(cx, &job).await
    }

    async fn cleanup(&self, cx: &MoverContext) -> Result<()> {
        delete_job(cx).await
    }
}

pub struct ResticMover {
    pub spec: ResticSpec,
}

#[async_trait]
impl Mover for ResticMover {
    fn name(&self) -> &'static str {
        "restic"
    }

    async fn prepare(&self, _cx: &MoverContext) -> Result<()> {
        Ok(())
    }

    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState> {
        let env = vec![EnvVar {
            name: "RESTIC_REPOSITORY".to_string(),
            value: Some(self.spec.repository.clone()),
            ..Default::default()
        }];
        let job = build_job(cx, &job_name(cx), DEFAULT_RESTIC_IMAGE, None, env, None, cx.privileged);
        run_job(cx, &job).await
    }

    async fn cleanup(&self, cx: &MoverContext) -> Result<()> {
        delete_job(cx).await
    }
}

pub struct KopiaMover {
    pub spec: KopiaSpec,
}

#[async_trait]
impl Mover for KopiaMover {
    fn name(&self) -> &'static str {
        "kopia"
    }

    async fn prepare(&self, _cx: &MoverContext) -> Result<()> {
        Ok(())
    }

    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState> {
        let env = vec![EnvVar {
            name: "KOPIA_REPOSITORY".to_string(),
            value: Some(self.spec.repository.clone()),
            ..Default::default()
        }];
        let job = build_job(cx, &job_name(cx), DEFAULT_KOPIA_IMAGE, None, env, None, cx.privileged);
        run_job(cx, &job).await
    }

    async fn cleanup(&self, cx: &MoverContext) -> Result<()> {
        delete_job(cx).await
    }
}

pub struct SyncthingMover {
    pub spec: SyncthingSpec,
}

#[async_trait]
impl Mover for SyncthingMover {
    fn name(&self) -> &'static str {
        "syncthing"
    }

    async fn prepare(&self, cx: &MoverContext) -> Result<()> {
        let svc_api: Api<Service> = Api::namespaced(cx.client.clone(), &cx.namespace);
        let name = job_name(cx);
        let service = Service {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(cx.namespace.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: self.spec.service_type.clone().or(Some("ClusterIP".to_string())),
                selector: Some(std::collections::BTreeMap::from([(
                    crate::labels::MOVER.to_string(),
                    cx.owner_name.clone(),
                )])),
                ports: Some(vec![ServicePort {
                    port: 22000,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            status: None,
        };
        let applied = create_if_absent(&svc_api, &name, &service).await?;
        report_service_address(cx, &applied).await;
        Ok(())
    }

    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState> {
        // Syncthing peers continuously; a Job is still used so its pod's
        // lifecycle and logs are uniform with the other movers, but success
        // is reported once the initial peer handshake completes (the mover
        // image signals this by exiting 0 after convergence, or keeps
        // running for `--continuous`; the core only observes the Job).
        let job = build_job(cx, &job_name(cx), DEFAULT_SYNCTHING_IMAGE, None, vec![], None, cx.privileged);
        run_job(cx, &job).await
    }

    async fn cleanup(&self, cx: &MoverContext) -> Result<()> {
        delete_job(cx).await
    }
}

pub struct ExternalMover {
    pub spec: ExternalSpec,
}

#[async_trait]
impl Mover for ExternalMover {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn prepare(&self, _cx: &MoverContext) -> Result<()> {
        Ok(())
    }

    async fn run(&self, cx: &MoverContext) -> Result<MoverRunState> {
        let env = self
            .spec
            .parameters
            .iter()
            .map(|(k, v)| EnvVar {
                name: format!("PARAM_{}", k.to_uppercase()),
                value: Some(v.clone()),
                ..Default::default()
            })
            .collect();
        let job = build_job(cx, &job_name(cx), &self.spec.provider, None, env, None, cx.privileged);
        run_job(cx, &job).await
    }

    async fn cleanup(&self, cx: &MoverContext) -> Result<()> {
        delete_job(cx).await
    }
}

