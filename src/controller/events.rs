//! Kubernetes `Event` emission (spec §6 "Events"): thin wrapper over
//! `kube::runtime::events::Recorder` so call sites pass just a reason,
//! action, and note rather than re-building a `Reporter`/`ObjectReference`
//! each time.

use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};

use crate::error::Result;

/// Build a `Recorder` reporting as the operator, scoped to `obj`.
pub fn recorder_for<K>(client: Client, obj: &K) -> Recorder
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    let reporter = Reporter {
        controller: "volsync-operator".into(),
        instance: std::env::var("POD_NAME").ok(),
    };
    Recorder::new(client, reporter, obj.object_ref(&()))
}

/// Emit a `Normal` event with the given reason/action/note (spec.md §6's
/// reason and action string constants live in `crate::labels::{event_reason,
/// event_action}`).
pub async fn normal(recorder: &Recorder, reason: &str, action: &str, note: impl Into<String>) -> Result<()> {
    recorder
        .publish(&Event {
            type_: EventType::Normal,
            reason: reason.to_string(),
            note: Some(note.into()),
            action: action.to_string(),
            secondary: None,
        })
        .await?;
    Ok(())
}

/// Emit a `Warning` event, e.g. `VolumeSnapshotNotBound`,
/// `PersistentVolumeClaimNotBound`, `NoServiceAddressAssigned`.
pub async fn warning(recorder: &Recorder, reason: &str, action: &str, note: impl Into<String>) -> Result<()> {
    recorder
        .publish(&Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(note.into()),
            action: action.to_string(),
            secondary: None,
        })
        .await?;
    Ok(())
}
