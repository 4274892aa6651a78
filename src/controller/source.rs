//! `ReplicationSource` controller: drives repeated point-in-time transfers
//! out of `spec.sourcePVC` (spec.md §4.A/§4.B/§4.C/§4.D applied to the
//! source side).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Client, ResourceExt};
use tracing::{info, instrument, warn};

use crate::cleanup;
use crate::controller::events;
use crate::controller::phase::{self, SessionState};
use crate::controller::resources::{
    owner_reference, patch_status, privileged_movers_enabled, temporary_labels, FIELD_MANAGER,
};
use crate::controller::{error_policy, evaluate_trigger, format_duration, ControllerState, TriggerOutcome};
use crate::crd::common::{
    upsert_condition, ConditionStatus, CopyMethod, MoverResult, MoverStatus, SynchronizingReason,
    CONDITION_SYNCHRONIZING,
};
use crate::crd::ReplicationSource;
use crate::error::{Error, Result};
use crate::labels::{event_action, event_reason};
use crate::mover::logs::tail_pod_logs;
use crate::mover::registry::build_mover;
use crate::mover::session::{step, SessionPhase, StepResult};
use crate::mover::{builder::job_name, MoverContext};
use crate::trigger::{self, copy_trigger};
use crate::volume;
use crate::volume::source as volume_source;

/// Start the `ReplicationSource` controller; runs until the process
/// receives a shutdown signal.
pub async fn run(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let api: Api<ReplicationSource> = match &state.config.namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    info!("starting ReplicationSource controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .concurrency(state.config.max_concurrent_reconciles)
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => info!(name = %obj.name, "reconciled ReplicationSource"),
                Err(e) => warn!(error = %e, "ReplicationSource reconcile error"),
            }
        })
        .await;

    Ok(())
}

#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<ReplicationSource>, ctx: Arc<ControllerState>) -> Result<Action> {
    let client = ctx.client.clone();
    let namespace = obj
        .namespace()
        .ok_or_else(|| Error::Validation("ReplicationSource has no namespace".to_string()))?;
    let name = obj.name_any();
    let generation = obj.meta().generation;

    crate::metrics::record_reconcile(&namespace, &name, "ReplicationSource");

    let api: Api<ReplicationSource> = Api::namespaced(client.clone(), &namespace);

    if let Err(msg) = obj.spec.validate() {
        return fail(&api, &name, &obj, msg, generation).await;
    }
    // Unwrap is safe: `validate()` above already confirmed exactly one
    // mover and (transitively) a resolvable `volumeOptions`.
    let copy_method = obj.spec.copy_method().map_err(Error::Validation)?;
    let volume_options = obj
        .spec
        .volume_options_ref()
        .map_err(Error::Validation)?
        .clone();

    let mut status = obj.status.clone().unwrap_or_default();
    status.observed_generation = generation;
    let mut session = phase::read(obj.as_ref());

    let pvc_api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace);
    let src_pvc = match pvc_api.get(&obj.spec.source_pvc).await {
        Ok(pvc) => pvc,
        Err(kube::Error::Api(e)) if e.code == 404 => {
            return Err(Error::Configuration(format!(
                "source PVC {} not found",
                obj.spec.source_pvc
            )));
        }
        Err(e) => return Err(Error::from(e)),
    };

    if session.phase == SessionPhase::Idle {
        let now = Utc::now();
        let last_sync_time = status.last_sync_time.as_ref().map(|t| t.0);
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
                // Copy-trigger protocol only gates Clone/Snapshot copies,
                // per spec.md §4.B ("before starting a Clone/Snapshot").
                let copy_trigger_token = if copy_method != CopyMethod::Direct {
                    let annotations = src_pvc.metadata.annotations.clone().unwrap_or_default();
                    match copy_trigger::decide(&annotations, now) {
                        copy_trigger::Decision::NotUsed => None,
                        copy_trigger::Decision::Start { token } => {
                            patch_pvc_annotations(&pvc_api, &obj.spec.source_pvc, &copy_trigger::patch_in_progress())
                                .await?;
                            Some(token)
                        }
                        copy_trigger::Decision::WaitEnter { patch } => {
                            patch_pvc_annotations(&pvc_api, &obj.spec.source_pvc, &patch).await?;
                            upsert_condition(
                                &mut status.conditions,
                                CONDITION_SYNCHRONIZING,
                                ConditionStatus::False,
                                SynchronizingReason::WaitingForManual,
                                "waiting for copy-trigger token",
                                generation,
                            );
                            patch_status(&api, &name, &status).await?;
                            return Ok(Action::requeue(Duration::from_secs(15)));
                        }
                        copy_trigger::Decision::WaitContinue { overdue } => {
                            let (status_enum, message) = if overdue {
                                (
                                    ConditionStatus::False,
                                    "copy-trigger wait has exceeded 10 minutes; still waiting",
                                )
                            } else {
                                (ConditionStatus::False, "waiting for copy-trigger token")
                            };
                            let reason = if overdue {
                                SynchronizingReason::Error
                            } else {
                                SynchronizingReason::WaitingForManual
                            };
                            upsert_condition(
                                &mut status.conditions,
                                CONDITION_SYNCHRONIZING,
                                status_enum,
                                reason,
                                message,
                                generation,
                            );
                            patch_status(&api, &name, &status).await?;
                            return Ok(Action::requeue(Duration::from_secs(15)));
                        }
                    }
                } else {
                    None
                };

                status.last_sync_start_time = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(now));
                session = SessionState {
                    phase: SessionPhase::Preparing,
                    manual_token,
                    copy_trigger_token,
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
                    event_action::CREATE_MOVER,
                    format!("starting sync for ReplicationSource {}", name),
                )
                .await
                .ok();

                return Ok(Action::requeue(Duration::from_secs(2)));
            }
        }
    }

    // A sync is already in flight: drive the mover session one step.
    let owner = owner_reference(obj.as_ref());
    let owner_uid = obj.uid().unwrap_or_default();
    let recorder = events::recorder_for(client.clone(), obj.as_ref());

    let data_pvc = match copy_method {
        CopyMethod::Direct => src_pvc.clone(),
        CopyMethod::None => unreachable!("canonicalize() never returns None"),
        _ => {
            let temp_name = volume::pvc_name("src", &name);
            let labels = temporary_labels(obj.as_ref(), "volsync-src");
            match volume_source::ensure_pvc_from_src(
                &client,
                &namespace,
                owner.clone(),
                &name,
                &temp_name,
                &src_pvc,
                &volume_options,
                labels,
            )
            .await
            {
                Ok(pvc) => pvc,
                Err(Error::NotReady(msg)) => {
                    let (reason, action) = if copy_method == CopyMethod::Snapshot {
                        (event_reason::VOLUME_SNAPSHOT_NOT_BOUND, event_action::CREATE_VOLUME_SNAPSHOT)
                    } else {
                        (event_reason::PVC_NOT_BOUND, event_action::CREATE_PVC)
                    };
                    events::warning(&recorder, reason, action, msg.clone()).await.ok();
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
    };

    let privileged = volume_options.volume_mode == Some(crate::crd::VolumeMode::Block)
        && privileged_movers_enabled(&client, &namespace).await;

    let cx = MoverContext {
        client: client.clone(),
        namespace: namespace.clone(),
        owner_name: name.clone(),
        owner_uid: owner_uid.clone(),
        owner_kind: "ReplicationSource",
        data_pvc_name: data_pvc.name_any(),
        is_source: true,
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
            if let Some(token) = &session.copy_trigger_token {
                patch_pvc_annotations(&pvc_api, &obj.spec.source_pvc, &copy_trigger::patch_completed(token))
                    .await
                    .ok();
            }

            match result {
                MoverResult::Successful => {
                    crate::metrics::record_mover_result(&namespace, &name, "ReplicationSource", "Successful");
                    crate::metrics::record_sync_completed(
                        &namespace,
                        &name,
                        "ReplicationSource",
                        (now - status.last_sync_start_time.as_ref().map(|t| t.0).unwrap_or(now))
                            .num_milliseconds() as f64
                            / 1000.0,
                        now.timestamp(),
                    );
                }
                MoverResult::Failed => {
                    crate::metrics::record_mover_result(&namespace, &name, "ReplicationSource", "Failed");
                    events::warning(
                        &recorder,
                        event_reason::TRANSFER_FAILED,
                        event_action::DELETE_MOVER,
                        format!("mover run failed for ReplicationSource {}", name),
                    )
                    .await
                    .ok();
                }
            }

            // Sweep the temporary Clone/Snapshot-restore PVC and the
            // source-side snapshot created for this iteration (spec §3
            // Lifecycle: deleted at the end of a successful iteration, or on
            // retry after a mover failure). Direct copyMethod creates
            // nothing, so this is a no-op there.
            let pvc_api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace);
            cleanup::cleanup_objects(&pvc_api, &owner_uid).await.ok();
            let snap_api: Api<crate::crd::snapshot::VolumeSnapshot> = Api::namespaced(client.clone(), &namespace);
            cleanup::cleanup_objects(&snap_api, &owner_uid).await.ok();

            phase::clear(&api, &name).await?;

            // Re-evaluate the trigger immediately so the Idle-state
            // condition/nextSyncTime reflect what was just recorded
            // instead of going stale until the next reconcile.
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
    api: &Api<ReplicationSource>,
    name: &str,
    obj: &ReplicationSource,
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

async fn patch_pvc_annotations(
    api: &Api<PersistentVolumeClaim>,
    name: &str,
    patch: &std::collections::BTreeMap<String, String>,
) -> Result<()> {
    let body = serde_json::json!({ "metadata": { "annotations": patch } });
    api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(body))
        .await
        .map_err(Error::from)?;
    Ok(())
}
