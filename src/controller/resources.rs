//! Shared object-building and object-lifecycle helpers used by both
//! controllers: owner references, standard labels, and the
//! create-or-update-or-recreate primitive for specs with immutable fields.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::labels::{APP_INSTANCE, APP_MANAGED_BY, APP_NAME, CLEANUP, MANAGED_BY_VALUE, OWNED, PRIVILEGED_MOVERS};

pub const FIELD_MANAGER: &str = "volsync-operator";

/// True if `namespace` carries `volsync.backube/privileged-movers: "true"`
/// (spec §6). A missing namespace is treated as opted-out rather than an
/// error, since the reconciler already holds a namespaced client for the CR.
pub async fn privileged_movers_enabled(client: &kube::Client, namespace: &str) -> bool {
    let api: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());
    match api.get(namespace).await {
        Ok(ns) => ns
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(PRIVILEGED_MOVERS))
            .map(|v| v == "true")
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Owner reference pointing at `owner`, with `controller: true` so the
/// garbage collector cascades deletes and `kube_runtime::Controller::owns`
/// can map child events back to it.
pub fn owner_reference<K>(owner: &K) -> OwnerReference
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: owner.name_any(),
        uid: owner.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
        ..Default::default()
    }
}

/// Standard `app.kubernetes.io/*` labels plus the `volsync.backube/owned`
/// marker, for any object created on behalf of `owner`.
pub fn standard_labels<K>(owner: &K, component: &str) -> BTreeMap<String, String>
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    let mut labels = BTreeMap::new();
    labels.insert(APP_NAME.to_string(), component.to_string());
    labels.insert(APP_INSTANCE.to_string(), owner.name_any());
    labels.insert(APP_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string());
    if let Some(uid) = owner.uid() {
        labels.insert(OWNED.to_string(), uid);
    }
    labels
}

/// Labels for a temporary object the core creates and later sweeps: the
/// standard `app.kubernetes.io/*` set plus `cleanup = <owner-uid>` (spec
/// invariant 4), on top of the `owned` marker `standard_labels` already
/// applies.
pub fn temporary_labels<K>(owner: &K, component: &str) -> BTreeMap<String, String>
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    let mut labels = standard_labels(owner, component);
    if let Some(uid) = owner.uid() {
        labels.insert(CLEANUP.to_string(), uid);
    }
    labels
}

/// Server-side apply a resource, creating it if absent. Used for the
/// subset of objects (Services, ServiceAccounts, ConfigMaps, most Job
/// specs) whose fields can simply be reconverged every pass.
pub async fn apply<K>(api: &Api<K>, name: &str, obj: &K) -> Result<K>
where
    K: kube::Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    let patch = Patch::Apply(obj);
    api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &patch)
        .await
        .map_err(Error::from)
}

/// Create-or-update-or-recreate: applies the object; if the API server
/// rejects the patch because an immutable field changed, deletes the
/// existing object and lets the next reconcile recreate it from scratch.
///
/// This is the primitive used for Jobs, whose `spec.template` is immutable
/// once set — a changed mover image or command requires deleting the old
/// Job rather than patching it in place.
pub async fn create_or_update_or_recreate<K>(api: &Api<K>, name: &str, obj: &K) -> Result<()>
where
    K: kube::Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    match apply(api, name, obj).await {
        Ok(_) => Ok(()),
        Err(Error::Kube(kube::Error::Api(e))) if e.code == 422 || e.code == 409 => {
            info!(name, "immutable field changed, deleting for recreation");
            let kind = K::kind(&Default::default()).to_string();
            match api.delete(name, &DeleteParams::default()).await {
                Ok(_) => Err(Error::Immutable {
                    kind,
                    name: name.to_string(),
                }),
                Err(kube::Error::Api(e)) if e.code == 404 => Err(Error::Immutable {
                    kind,
                    name: name.to_string(),
                }),
                Err(e) => Err(Error::from(e)),
            }
        }
        Err(e) => Err(e),
    }
}

/// Patch a resource's status subresource via server-side apply, following
/// the teacher's `update_status`/`update_pool_status` convention.
pub async fn patch_status<K, S>(api: &Api<K>, name: &str, status: &S) -> Result<()>
where
    K: kube::Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
    S: Serialize,
{
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(patch))
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Create an object only if it doesn't already exist; a 409 Conflict on
/// create (the object showed up between `get` and `create`) is treated as
/// success.
pub async fn create_if_absent<K>(api: &Api<K>, name: &str, obj: &K) -> Result<K>
where
    K: kube::Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    match api.get(name).await {
        Ok(existing) => Ok(existing),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            match api.create(&PostParams::default(), obj).await {
                Ok(created) => Ok(created),
                Err(kube::Error::Api(e)) if e.code == 409 => api.get(name).await.map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            }
        }
        Err(e) => Err(Error::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ReplicationSource;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn source(name: &str, uid: &str) -> ReplicationSource {
        ReplicationSource {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                uid: Some(uid.to_string()),
                ..Default::default()
            },
            spec: crate::crd::ReplicationSourceSpec {
                source_pvc: "data".to_string(),
                trigger: None,
                paused: false,
                rsync: Some(Default::default()),
                rsync_tls: None,
                rclone: None,
                restic: None,
                kopia: None,
                syncthing: None,
                external: None,
            },
            status: None,
        }
    }

    #[test]
    fn owner_reference_carries_controller_flags() {
        let src = source("db", "uid-1");
        let owner = owner_reference(&src);
        assert_eq!(owner.name, "db");
        assert_eq!(owner.uid, "uid-1");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(owner.block_owner_deletion, Some(true));
        assert_eq!(owner.kind, "ReplicationSource");
    }

    #[test]
    fn standard_labels_include_owned_marker() {
        let src = source("db", "uid-1");
        let labels = standard_labels(&src, "rsync-mover");
        assert_eq!(labels.get(OWNED).unwrap(), "uid-1");
        assert_eq!(labels.get(APP_INSTANCE).unwrap(), "db");
        assert_eq!(labels.get(APP_NAME).unwrap(), "rsync-mover");
    }
}
