//! `ReplicationDestination` controller: provisions a destination PVC,
//! drives the mover session, and advances `status.latestImage` on success
//! (spec.md §4.A/§4.B/§4.C applied to the destination side).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Client, ResourceExt};
use tracing::{info, instrument, warn};

use crate::cleanup;
use crate::controller::events;
use crate::controller::phase::{self, SessionState};
use crate::controller::resources::{
    owner_reference, patch_status, privileged_movers_enabled, standard_labels, temporary_labels,
};
use crate::controller::{error_policy, evaluate_trigger, format_duration, ControllerState, TriggerOutcome};
use crate::crd::common::{upsert_condition, ConditionStatus, MoverResult, MoverStatus, SynchronizingReason, CONDITION_SYNCHRONIZING};
use crate::crd::snapshot::VolumeSnapshot;
use crate::crd::ReplicationDestination;
use crate::error::{Error, Result};
use crate::labels::event_reason;
use crate::mover::logs::tail_pod_logs;
use crate::mover::registry::build_mover;
use crate::mover::session::{step, SessionPhase, StepResult};
use crate::mover::{builder::job_name, MoverContext};
use crate::trigger;
use crate::volume;
use crate::volume::destination as volume_destination;

/// Start the `ReplicationDestination` controller; runs until the process
/// receives a shutdown signal.
pub async fn run(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let api: Api<ReplicationDestination> = match &state.config.namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    info!("starting ReplicationDestination controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .concurrency(state.config.max_concurrent_reconciles)
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => info!(name = %obj.name, "reconciled ReplicationDestination"),
                Err(e) => warn!(error = %e, "ReplicationDestination reconcile error"),
            }
        })
        .await;

    Ok(())
}

#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<ReplicationDestination>, ctx: Arc<ControllerState>) -> Result<Action> {
    let client = ctx.client.clone();
    let namespace = obj
        .namespace()
        .ok_or_else(|| Error::Validation("ReplicationDestination has no namespace".to_string()))?;
    let name = obj.name_any();
    let generation = obj.meta().generation;

    crate::metrics::record_reconcile(&namespace, &name, "ReplicationDestination");

    let api: Api<ReplicationDestination> = Api::namespaced(client.clone(), &namespace);

    if let Err(msg) = obj.spec.validate() {
        return fail(&api, &name, &obj, msg, generation).await;
    }
    let copy_method = obj.spec.copy_method().map_err(Error::Validation)?;
    let volume_options = obj
        .spec
        .volume_options_ref()
        .map_err(Error::Validation)?
        .clone();

    let mut status = obj.status.clone().unwrap_or_default();
    status.observed_generation = generation;
    let mut session = phase::read(obj.as_ref());

    if session.phase == SessionPhase::Idle {
        let now = Utc::now();
        let last_sync_time = status.last_sync_time.as_ref().map(|t| t.0);
        // ReplicationDestination has no source PVC, so the copy-trigger
        // protocol (spec §4.B) never applies here.
        let decision = trigger::decide(
            now,
            obj.spec.trigger.as_ref(),
            obj.spec.paused,
            last_sync_time,
            status.last_manual_sync.as_deref(),
        );

        match evaluate_trigger(&mut status.conditions, &mut status.next_sync_time, generation, now, decision) {
            TriggerOutcome::Defer(action) => {
                patch_status(&api, &name, &status).await?;
                return Ok(action);
            }
            TriggerOutcome::Start { manual_token } => {
                status.last_sync_start_time = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(now));
                session = SessionState {
                    phase: SessionPhase::Preparing,
                    manual_token,
                    copy_trigger_token: None,
                };
                phase::write(&api, &name, &session).await?;

                upsert_condition(
                    &mut status.conditions,
                    CONDITION_SYNCHRONIZING,
                    ConditionStatus::True,
                    SynchronizingReason::SyncInProgress,
                    "starting sync",
                    generation,
                );
                patch_status(&api, &name, &status).await?;

                let recorder = events::recorder_for(client.clone(), obj.as_ref());
                events::normal(
                    &recorder,
                    event_reason::TRANSFER_STARTED,
                    crate::labels::event_action::CREATE_MOVER,
                    format!("starting sync for ReplicationDestination {}", name),
                )
                .await
                .ok();

                return Ok(Action::requeue(Duration::from_secs(2)));
            }
        }
    }

    // A sync is already in flight: provision the destination PVC, then
    // drive the mover session one step.
    let owner = owner_reference(obj.as_ref());
    let owner_uid = obj.uid().unwrap_or_default();
    let temp_name = volume::pvc_name("dst", &name);
    let labels = temporary_labels(obj.as_ref(), "volsync-dst");

    let data_pvc = volume_destination::ensure_new_pvc(
        &client,
        &namespace,
        owner.clone(),
        &temp_name,
        &volume_options,
        labels.clone(),
    )
    .await?;

    let privileged = volume_options.volume_mode == Some(crate::crd::VolumeMode::Block)
        && privileged_movers_enabled(&client, &namespace).await;
    let recorder = events::recorder_for(client.clone(), obj.as_ref());

    let cx = MoverContext {
        client: client.clone(),
        namespace: namespace.clone(),
        owner_name: name.clone(),
        owner_uid: owner_uid.clone(),
        owner_kind: "ReplicationDestination",
        data_pvc_name: data_pvc.name_any(),
        is_source: false,
        privileged,
        recorder: recorder.clone(),
    };
    let mover = build_mover(&obj.spec);

    let in_flight_reason = match session.phase {
        SessionPhase::Preserving(_) | SessionPhase::Cleaning(_) => SynchronizingReason::CleaningUp,
        _ => SynchronizingReason::SyncInProgress,
    };
    upsert_condition(
        &mut status.conditions,
        CONDITION_SYNCHRONIZING,
        ConditionStatus::True,
        in_flight_reason,
        "sync in progress",
        generation,
    );

    // `mover::session::step` treats `Preserving` as a pass-through: the
    // durable image is advanced here, between `Preserving` and `Cleaning`,
    // because only the controller has access to `volume::destination` and
    // the CR's previous `status.latestImage`.
    if let SessionPhase::Preserving(result) = session.phase {
        if result == MoverResult::Successful {
            // `latestImage` is a durable, preserved object, not a sweepable
            // temporary: it must never carry the `cleanup` label until a
            // successor supersedes it (spec invariant 2), so it's labeled
            // with `owned` only, unlike the destination PVC above.
            let image_labels = standard_labels(obj.as_ref(), "volsync-dst");
            let advance = volume_destination::ensure_image(
                &client,
                &namespace,
                owner.clone(),
                &name,
                &data_pvc,
                copy_method,
                volume_options.volume_snapshot_class_name.as_deref(),
                status.latest_image.as_ref(),
                Utc::now(),
                image_labels,
            )
            .await;

            match advance {
                Ok(advance) => {
                    if let Some(superseded) = advance.superseded_snapshot {
                        let snap_api: Api<VolumeSnapshot> = Api::namespaced(client.clone(), &namespace);
                        cleanup::mark_for_cleanup(&snap_api, &superseded, &owner_uid)
                            .await
                            .ok();
                    }
                    events::normal(
                        &recorder,
                        event_reason::VOLUME_SNAPSHOT_CREATED,
                        crate::labels::event_action::CREATE_VOLUME_SNAPSHOT,
                        format!("latestImage advanced to {}", advance.image.name),
                    )
                    .await
                    .ok();
                    status.latest_image = Some(advance.image);
                }
                Err(Error::NotReady(msg)) => {
                    events::warning(
                        &recorder,
                        event_reason::VOLUME_SNAPSHOT_NOT_BOUND,
                        crate::labels::event_action::CREATE_VOLUME_SNAPSHOT,
                        msg.clone(),
                    )
                    .await
                    .ok();
                    upsert_condition(
                        &mut status.conditions,
                        CONDITION_SYNCHRONIZING,
                        ConditionStatus::True,
                        SynchronizingReason::SyncInProgress,
                        msg,
                        generation,
                    );
                    patch_status(&api, &name, &status).await?;
                    return Ok(Action::requeue(Duration::from_secs(10)));
                }
                Err(e) => return Err(e),
            }
        }
    }

    match step(session.phase, mover.as_ref(), &cx).await? {
        StepResult::Continue(next_phase) => {
            session.phase = next_phase;
            phase::write(&api, &name, &session).await?;
            patch_status(&api, &name, &status).await?;
            Ok(Action::requeue(Duration::from_secs(5)))
        }
        StepResult::Finished(result) => {
            let now = Utc::now();
            let logs = tail_pod_logs(&client, &namespace, &job_name(&cx), None)
                .await
                .unwrap_or(None);
            status.latest_mover_status = Some(MoverStatus {
                result: Some(result),
                logs,
            });
            status.last_sync_time = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(now));
            if let Some(start) = &status.last_sync_start_time {
                status.last_sync_duration = Some(format_duration(now - start.0));
            }
            if let Some(token) = &session.manual_token {
                status.last_manual_sync = Some(token.clone());
            }

            match result {
                MoverResult::Successful => {
                    crate::metrics::record_mover_result(&namespace, &name, "ReplicationDestination", "Successful");
                    crate::metrics::record_sync_completed(
                        &namespace,
                        &name,
                        "ReplicationDestination",
                        (now - status.last_sync_start_time.as_ref().map(|t| t.0).unwrap_or(now))
                            .num_milliseconds() as f64
                            / 1000.0,
                        now.timestamp(),
                    );
                }
                MoverResult::Failed => {
                    crate::metrics::record_mover_result(&namespace, &name, "ReplicationDestination", "Failed");
                    events::warning(
                        &recorder,
                        event_reason::TRANSFER_FAILED,
                        crate::labels::event_action::DELETE_MOVER,
                        format!("mover run failed for ReplicationDestination {}", name),
                    )
                    .await
                    .ok();
                }
            }

            // Sweep temporary PVCs and superseded snapshots labeled
            // `cleanup=<uid>` for this CR. The current `latestImage`
            // snapshot was created without that label, so it survives this
            // pass regardless of whether it happens to match by name.
            let pvc_api: Api<k8s_openapi::api::core::v1::PersistentVolumeClaim> =
                Api::namespaced(client.clone(), &namespace);
            cleanup::cleanup_objects(&pvc_api, &owner_uid).await.ok();
            let snap_api: Api<VolumeSnapshot> = Api::namespaced(client.clone(), &namespace);
            cleanup::cleanup_objects(&snap_api, &owner_uid).await.ok();

            phase::clear(&api, &name).await?;

            let decision = trigger::decide(
                now,
                obj.spec.trigger.as_ref(),
                obj.spec.paused,
                status.last_sync_time.as_ref().map(|t| t.0),
                status.last_manual_sync.as_deref(),
            );
            let action = match evaluate_trigger(&mut status.conditions, &mut status.next_sync_time, generation, now, decision)
            {
                TriggerOutcome::Defer(action) => action,
                TriggerOutcome::Start { .. } => Action::requeue(Duration::from_secs(1)),
            };
            patch_status(&api, &name, &status).await?;
            Ok(action)
        }
    }
}

async fn fail(
    api: &Api<ReplicationDestination>,
    name: &str,
    obj: &ReplicationDestination,
    message: String,
    generation: Option<i64>,
) -> Result<Action> {
    let mut status = obj.status.clone().unwrap_or_default();
    upsert_condition(
        &mut status.conditions,
        CONDITION_SYNCHRONIZING,
        ConditionStatus::False,
        SynchronizingReason::Error,
        message,
        generation,
    );
    patch_status(api, name, &status).await?;
    Ok(Action::await_change())
}
