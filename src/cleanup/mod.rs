//! Temporary-object lifecycle (spec §6): marking objects for cleanup,
//! sweeping them, and the `do-not-delete` relinquish path.

use std::collections::BTreeMap;

use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, Preconditions};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::controller::resources::FIELD_MANAGER;
use crate::error::{Error, Result};
use crate::labels::{CLEANUP, DO_NOT_DELETE, OWNED};

/// Stamp the object named `name` with the `cleanup=<owner-uid>` label via a
/// merge patch, so a later sweep can find and delete it.
pub async fn mark_for_cleanup<K>(api: &Api<K>, name: &str, owner_uid: &str) -> Result<()>
where
    K: Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    let patch = serde_json::json!({
        "metadata": { "labels": { CLEANUP: owner_uid } }
    });
    api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(patch))
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Delete every object of kind `K` in `api` labeled `cleanup=<owner_uid>`,
/// except those additionally labeled `do-not-delete` (those are relinquished
/// instead: cleanup/owned labels and the controller owner reference are
/// stripped so the object survives the CR's deletion as a free-standing
/// resource).
pub async fn cleanup_objects<K>(api: &Api<K>, owner_uid: &str) -> Result<usize>
where
    K: Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    let list = api
        .list(&ListParams::default().labels(&format!("{}={}", CLEANUP, owner_uid)))
        .await
        .map_err(Error::from)?;

    let mut deleted = 0;
    for obj in list.items {
        let name = obj.name_any();
        let keep = obj.labels().contains_key(DO_NOT_DELETE);

        if keep {
            relinquish(api, &name).await?;
            continue;
        }

        let precondition = obj.resource_version().map(|rv| Preconditions {
            resource_version: Some(rv),
            uid: None,
        });
        let dp = DeleteParams {
            preconditions: precondition,
            ..Default::default()
        };
        match api.delete(&name, &dp).await {
            Ok(_) => {
                info!(name, "deleted cleanup-labeled object");
                deleted += 1;
            }
            Err(kube::Error::Api(e)) if e.code == 404 || e.code == 409 => {
                // Already gone, or resourceVersion moved under us; the next
                // sweep will pick it up if it still matches.
            }
            Err(e) => return Err(Error::from(e)),
        }
    }
    Ok(deleted)
}

/// Strip the `cleanup`/`owned` labels and controller owner reference from an
/// object, so it survives its owning CR's deletion instead of being swept.
async fn relinquish<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    warn!(name, "do-not-delete set, relinquishing ownership instead of deleting");
    let patch = serde_json::json!({
        "metadata": {
            "labels": { CLEANUP: serde_json::Value::Null, OWNED: serde_json::Value::Null },
            "ownerReferences": [],
        }
    });
    api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Labels an old point-in-time snapshot for cleanup once a newer one has
/// taken its place as `status.latestImage`, unless it carries
/// `do-not-delete`.
pub fn should_cleanup_snapshot(labels: &BTreeMap<String, String>) -> bool {
    !labels.contains_key(DO_NOT_DELETE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn do_not_delete_any_value_blocks_cleanup() {
        let labels = BTreeMap::from([(DO_NOT_DELETE.to_string(), "true".to_string())]);
        assert!(!should_cleanup_snapshot(&labels));
        let labels = BTreeMap::from([(DO_NOT_DELETE.to_string(), "yes".to_string())]);
        assert!(!should_cleanup_snapshot(&labels));
    }

    #[test]
    fn absent_do_not_delete_allows_cleanup() {
        assert!(should_cleanup_snapshot(&BTreeMap::new()));
    }
}
