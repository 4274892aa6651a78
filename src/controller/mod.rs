//! The reconciler loop (spec §4.A): one `kube_runtime::Controller` pipeline
//! per CR kind, sharing the helpers in this module and the sibling
//! `events`/`phase`/`resources` modules.

pub mod destination;
pub mod events;
pub mod phase;
pub mod resources;
pub mod source;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};

use crate::config::OperatorConfig;
use crate::crd::common::{upsert_condition, Condition, ConditionStatus, SynchronizingReason, CONDITION_SYNCHRONIZING};
use crate::error::Error;
use crate::trigger::TriggerDecision;

/// Shared state handed to every reconcile invocation, the same
/// `ControllerState { client }` shape the teacher uses, generalized with
/// the operator's process-wide config (spec §9's "only mutable global
/// state": the SCC name, set once at startup).
pub struct ControllerState {
    pub client: Client,
    pub config: OperatorConfig,
}

/// Run both controllers concurrently until either exits or the process
/// receives a shutdown signal.
pub async fn run(state: Arc<ControllerState>) -> crate::error::Result<()> {
    let source = source::run(state.clone());
    let destination = destination::run(state.clone());
    tokio::try_join!(source, destination)?;
    Ok(())
}

/// Outcome of folding a `TriggerDecision` into a reconcile pass: either the
/// caller should stop here and return `action`, having already recorded the
/// appropriate condition/`nextSyncTime` on `status`, or it should proceed to
/// start a sync with the given manual token (if any).
pub(crate) enum TriggerOutcome {
    Defer(Action),
    Start { manual_token: Option<String> },
}

/// Shared between `source::reconcile` and `destination::reconcile`: applies
/// spec.md §4.B's decision table outcome to the `Synchronizing` condition
/// and (for schedule waits) `nextSyncTime`, and picks the resulting
/// `Action`.
pub(crate) fn evaluate_trigger(
    conditions: &mut Vec<Condition>,
    next_sync_time: &mut Option<Time>,
    generation: Option<i64>,
    now: DateTime<Utc>,
    decision: TriggerDecision,
) -> TriggerOutcome {
    match decision {
        TriggerDecision::Paused => {
            upsert_condition(
                conditions,
                CONDITION_SYNCHRONIZING,
                ConditionStatus::False,
                SynchronizingReason::WaitingForSchedule,
                "paused",
                generation,
            );
            TriggerOutcome::Defer(Action::await_change())
        }
        TriggerDecision::WaitingForManual => {
            upsert_condition(
                conditions,
                CONDITION_SYNCHRONIZING,
                ConditionStatus::False,
                SynchronizingReason::WaitingForManual,
                "waiting for a new manual trigger token",
                generation,
            );
            TriggerOutcome::Defer(Action::await_change())
        }
        TriggerDecision::WaitingForSchedule { next } => {
            *next_sync_time = next.map(Time);
            upsert_condition(
                conditions,
                CONDITION_SYNCHRONIZING,
                ConditionStatus::False,
                SynchronizingReason::WaitingForSchedule,
                "waiting for next scheduled sync",
                generation,
            );
            let wait = next
                .map(|n| (n - now).to_std().unwrap_or(Duration::from_secs(30)))
                .unwrap_or(Duration::from_secs(30))
                .max(Duration::from_secs(1));
            TriggerOutcome::Defer(Action::requeue(wait))
        }
        TriggerDecision::Start { manual_token } => TriggerOutcome::Start { manual_token },
    }
}

/// Render a `chrono::Duration` the way Go's `time.Duration.String()` would
/// (`"1m30.5s"`), matching `status.lastSyncDuration`'s Go-originated shape.
pub(crate) fn format_duration(d: chrono::Duration) -> String {
    let total_ms = d.num_milliseconds().max(0);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) as f64 / 1000.0;

    let mut s = String::new();
    if hours > 0 {
        s.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        s.push_str(&format!("{}m", minutes));
    }
    s.push_str(&format!("{:.3}s", seconds));
    s
}

/// Shared `error_policy` for both controllers: maps the `Error`
/// classification from spec.md §7 onto a requeue action.
pub(crate) fn error_policy<K>(obj: Arc<K>, error: &Error, _ctx: Arc<ControllerState>) -> Action
where
    K: Resource + ResourceExt,
{
    let name = obj.name_any();
    match error {
        Error::Validation(msg) => {
            tracing::warn!(name, %msg, "validation error, waiting for spec change");
            Action::await_change()
        }
        Error::Configuration(msg) => {
            tracing::warn!(name, %msg, "configuration error, waiting on referenced object");
            Action::requeue(Duration::from_secs(300))
        }
        Error::NotReady(msg) => {
            tracing::debug!(name, %msg, "not ready, short requeue");
            Action::requeue(Duration::from_secs(5))
        }
        Error::Immutable { kind, name: obj_name } => {
            tracing::info!(name, kind, obj_name, "recreating after immutable field change");
            Action::requeue(Duration::from_secs(1))
        }
        Error::Kube(kube::Error::Api(e)) if e.code == 409 || e.code == 404 => {
            tracing::debug!(name, code = e.code, "transient API error, short requeue");
            Action::requeue(Duration::from_secs(2))
        }
        Error::MoverFailed(msg) => {
            tracing::warn!(name, %msg, "mover run failed");
            Action::requeue(Duration::from_secs(10))
        }
        other => {
            tracing::error!(name, error = %other, "unclassified error");
            Action::requeue(Duration::from_secs(60))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_duration_renders_minutes_and_seconds() {
        let d = chrono::Duration::milliseconds(90_500);
        assert_eq!(format_duration(d), "1m30.500s");
    }

    #[test]
    fn format_duration_renders_seconds_only() {
        let d = chrono::Duration::milliseconds(1_250);
        assert_eq!(format_duration(d), "1.250s");
    }

    #[test]
    fn evaluate_trigger_paused_defers_without_requeue_time() {
        let mut conditions = Vec::new();
        let mut next = None;
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let outcome = evaluate_trigger(&mut conditions, &mut next, None, now, TriggerDecision::Paused);
        assert!(matches!(outcome, TriggerOutcome::Defer(_)));
        assert_eq!(conditions[0].reason, "WaitingForSchedule");
    }
}
