//! Copy-trigger protocol on the source PVC (spec §4.B).
//!
//! Kept as pure functions over an annotation map so the state machine is
//! unit-testable without a cluster: the controller is responsible for
//! reading the PVC's annotations, calling `decide`, applying whatever patch
//! the decision carries, and (at the end of a successful sync) calling
//! `patch_completed`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::labels::{
    copy_status, COPY_TRIGGER, LATEST_COPY_STATUS, LATEST_COPY_TRIGGER,
    LATEST_COPY_TRIGGER_WAITING_SINCE, USE_COPY_TRIGGER,
};

/// How long the engine waits before surfacing an error on the CR's status
/// while still continuing to wait indefinitely (spec §9, Open Question a:
/// there is no hard abort after this timeout).
pub const WAIT_SURFACE_ERROR_AFTER: Duration = Duration::minutes(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// `use-copy-trigger` isn't set (or isn't `"true"`); the protocol does
    /// not gate this sync at all.
    NotUsed,
    /// A fresh token (distinct from `latest-copy-trigger`) is present;
    /// proceed with the sync. The caller should apply `patch_in_progress()`
    /// immediately and remember `token` to record on completion.
    Start { token: String },
    /// First observation of the wait state for this token generation;
    /// apply `patch` and defer.
    WaitEnter { patch: BTreeMap<String, String> },
    /// Still waiting on a previously-entered wait state; defer. `overdue`
    /// is true once more than `WAIT_SURFACE_ERROR_AFTER` has elapsed, in
    /// which case the caller should surface (but not abort on) an error.
    WaitContinue { overdue: bool },
}

fn is_enabled(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(USE_COPY_TRIGGER)
        .map(|v| v == "true")
        .unwrap_or(false)
}

pub fn decide(annotations: &BTreeMap<String, String>, now: DateTime<Utc>) -> Decision {
    if !is_enabled(annotations) {
        return Decision::NotUsed;
    }

    if let Some(token) = annotations.get(COPY_TRIGGER) {
        let latest = annotations.get(LATEST_COPY_TRIGGER).map(String::as_str);
        if latest != Some(token.as_str()) {
            return Decision::Start {
                token: token.clone(),
            };
        }
    }

    match annotations.get(LATEST_COPY_TRIGGER_WAITING_SINCE) {
        None => {
            let mut patch = BTreeMap::new();
            patch.insert(
                LATEST_COPY_STATUS.to_string(),
                copy_status::WAITING_FOR_TRIGGER.to_string(),
            );
            patch.insert(LATEST_COPY_TRIGGER_WAITING_SINCE.to_string(), now.to_rfc3339());
            Decision::WaitEnter { patch }
        }
        Some(since_str) => {
            let overdue = DateTime::parse_from_rfc3339(since_str)
                .map(|since| now - since.with_timezone(&Utc) > WAIT_SURFACE_ERROR_AFTER)
                .unwrap_or(false);
            Decision::WaitContinue { overdue }
        }
    }
}

/// Annotations to apply the moment a fresh token is accepted and the sync
/// actually starts.
pub fn patch_in_progress() -> BTreeMap<String, String> {
    let mut patch = BTreeMap::new();
    patch.insert(
        LATEST_COPY_STATUS.to_string(),
        copy_status::IN_PROGRESS.to_string(),
    );
    patch.insert(LATEST_COPY_TRIGGER_WAITING_SINCE.to_string(), String::new());
    patch
}

/// Annotations to apply when the sync gated by `token` completes
/// (successfully or not — spec invariant 6: `lastManualSync`/copy-trigger
/// bookkeeping advances on completion regardless of mover result).
pub fn patch_completed(token: &str) -> BTreeMap<String, String> {
    let mut patch = BTreeMap::new();
    patch.insert(
        LATEST_COPY_STATUS.to_string(),
        copy_status::COMPLETED.to_string(),
    );
    patch.insert(LATEST_COPY_TRIGGER.to_string(), token.to_string());
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ann(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn not_used_when_annotation_absent() {
        let a = ann(&[]);
        assert_eq!(decide(&a, Utc::now()), Decision::NotUsed);
    }

    #[test]
    fn enters_wait_state_on_first_observation() {
        let a = ann(&[(USE_COPY_TRIGGER, "true")]);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        match decide(&a, now) {
            Decision::WaitEnter { patch } => {
                assert_eq!(
                    patch.get(LATEST_COPY_STATUS).unwrap(),
                    copy_status::WAITING_FOR_TRIGGER
                );
                assert_eq!(
                    patch.get(LATEST_COPY_TRIGGER_WAITING_SINCE).unwrap(),
                    &now.to_rfc3339()
                );
            }
            other => panic!("expected WaitEnter, got {:?}", other),
        }
    }

    #[test]
    fn continues_waiting_without_overdue_before_ten_minutes() {
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = ann(&[
            (USE_COPY_TRIGGER, "true"),
            (LATEST_COPY_TRIGGER_WAITING_SINCE, &since.to_rfc3339()),
        ]);
        let now = since + Duration::minutes(5);
        assert_eq!(decide(&a, now), Decision::WaitContinue { overdue: false });
    }

    #[test]
    fn surfaces_error_after_ten_minutes_but_keeps_waiting() {
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = ann(&[
            (USE_COPY_TRIGGER, "true"),
            (LATEST_COPY_TRIGGER_WAITING_SINCE, &since.to_rfc3339()),
        ]);
        let now = since + Duration::minutes(11);
        assert_eq!(decide(&a, now), Decision::WaitContinue { overdue: true });
    }

    #[test]
    fn fresh_token_starts_sync() {
        let a = ann(&[
            (USE_COPY_TRIGGER, "true"),
            (COPY_TRIGGER, "v1"),
            (LATEST_COPY_TRIGGER, "v0"),
        ]);
        assert_eq!(
            decide(&a, Utc::now()),
            Decision::Start {
                token: "v1".to_string()
            }
        );
    }

    #[test]
    fn matching_token_does_not_restart() {
        let a = ann(&[
            (USE_COPY_TRIGGER, "true"),
            (COPY_TRIGGER, "v1"),
            (LATEST_COPY_TRIGGER, "v1"),
            (LATEST_COPY_TRIGGER_WAITING_SINCE, ""),
        ]);
        // Falls through to the wait branch since the token already matches.
        match decide(&a, Utc::now()) {
            Decision::WaitContinue { .. } => {}
            other => panic!("expected WaitContinue, got {:?}", other),
        }
    }
}
