//! Reconciler-private session-phase bookkeeping, stored as CR annotations
//! (spec §9: "async without coroutines" — every blocking wait is expressed
//! as poll-and-requeue, so the mover session's current phase must survive
//! across independent reconcile invocations without a blocking in-memory
//! stack frame).

use std::collections::BTreeMap;

use kube::api::{Api, Patch, PatchParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::controller::resources::FIELD_MANAGER;
use crate::crd::get_annotation;
use crate::error::{Error, Result};
use crate::labels::{SESSION_COPY_TRIGGER_TOKEN, SESSION_MANUAL_TOKEN, SESSION_PHASE};
use crate::mover::session::SessionPhase;

/// What the controller persists between reconciles while a sync is
/// in-flight.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub manual_token: Option<String>,
    pub copy_trigger_token: Option<String>,
}

pub fn read<K: Resource>(obj: &K) -> SessionState {
    let annotations = obj.meta().annotations.clone();
    let phase = get_annotation(&annotations, SESSION_PHASE)
        .and_then(SessionPhase::parse)
        .unwrap_or(SessionPhase::Idle);
    let manual_token = get_annotation(&annotations, SESSION_MANUAL_TOKEN).map(str::to_string);
    let copy_trigger_token = get_annotation(&annotations, SESSION_COPY_TRIGGER_TOKEN).map(str::to_string);
    SessionState {
        phase,
        manual_token,
        copy_trigger_token,
    }
}

/// Persist a new phase (and optionally the tokens associated with the
/// in-flight sync) as annotations via a merge patch.
pub async fn write<K>(api: &Api<K>, name: &str, state: &SessionState) -> Result<()>
where
    K: Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    let mut annotations = BTreeMap::new();
    annotations.insert(SESSION_PHASE.to_string(), state.phase.as_str().to_string());
    annotations.insert(
        SESSION_MANUAL_TOKEN.to_string(),
        state.manual_token.clone().unwrap_or_default(),
    );
    annotations.insert(
        SESSION_COPY_TRIGGER_TOKEN.to_string(),
        state.copy_trigger_token.clone().unwrap_or_default(),
    );
    let patch = serde_json::json!({ "metadata": { "annotations": annotations } });
    api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(patch))
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Clear the session annotations once a sync finishes and the CR returns
/// to `Idle`.
pub async fn clear<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
{
    write(
        api,
        name,
        &SessionState {
            phase: SessionPhase::Idle,
            manual_token: None,
            copy_trigger_token: None,
        },
    )
    .await
}
