//! Trigger evaluation (spec §4.B): decides, for a single reconcile, whether
//! a new sync should start.

pub mod copy_trigger;
pub mod cron;

use chrono::{DateTime, Utc};

use crate::crd::Trigger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// `spec.paused` is true; no new sync starts, an in-flight one still
    /// completes.
    Paused,
    /// A schedule is configured and hasn't fired yet. `next` is `None` only
    /// when the schedule failed to parse (caller surfaces it as an error
    /// condition rather than treating it as "never").
    WaitingForSchedule { next: Option<DateTime<Utc>> },
    /// A manual token is configured but has already been consumed by a
    /// previous sync (`lastManualSync` matches it) and no schedule is set.
    WaitingForManual,
    /// Start a sync now. `manual_token`, when set, is the token to record
    /// as `lastManualSync` once this sync completes.
    Start { manual_token: Option<String> },
}

/// Evaluate the trigger decision table.
///
/// Precedence, per DESIGN.md Open Question (c): an unconsumed manual token
/// always wins over a schedule, even if both are set. Once the manual token
/// is consumed (`lastManualSync` catches up to it), the schedule (if any)
/// governs normally.
pub fn decide(
    now: DateTime<Utc>,
    trigger: Option<&Trigger>,
    paused: bool,
    last_sync_time: Option<DateTime<Utc>>,
    last_manual_sync: Option<&str>,
) -> TriggerDecision {
    if paused {
        return TriggerDecision::Paused;
    }

    // Never synced before: start immediately regardless of schedule/manual,
    // matching the "first sync is unconditional" behavior implied by spec
    // §4.B's worked example.
    if last_sync_time.is_none() {
        let manual_token = trigger.and_then(|t| t.manual.clone());
        return TriggerDecision::Start { manual_token };
    }

    let Some(trigger) = trigger else {
        // No trigger at all: continuous mode, sync on every reconcile.
        return TriggerDecision::Start { manual_token: None };
    };

    if let Some(manual) = &trigger.manual {
        if last_manual_sync != Some(manual.as_str()) {
            return TriggerDecision::Start {
                manual_token: Some(manual.clone()),
            };
        }
    }

    if let Some(schedule) = &trigger.schedule {
        return match cron::first_fire_time_after(schedule, last_sync_time.unwrap()) {
            Ok(Some(next)) if next <= now => TriggerDecision::Start { manual_token: None },
            Ok(next) => TriggerDecision::WaitingForSchedule { next },
            Err(_) => TriggerDecision::WaitingForSchedule { next: None },
        };
    }

    if trigger.manual.is_some() {
        // Manual token already consumed, no schedule to fall back to.
        return TriggerDecision::WaitingForManual;
    }

    // Trigger object present but neither field set: continuous mode.
    TriggerDecision::Start { manual_token: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(now: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(now, 0).unwrap()
    }

    #[test]
    fn paused_always_defers() {
        let trigger = Trigger {
            schedule: None,
            manual: Some("a".to_string()),
        };
        assert_eq!(
            decide(t(100), Some(&trigger), true, Some(t(0)), None),
            TriggerDecision::Paused
        );
    }

    #[test]
    fn first_sync_is_unconditional() {
        let trigger = Trigger {
            schedule: Some("0 0 1 1 *".to_string()),
            manual: None,
        };
        assert_eq!(
            decide(t(100), Some(&trigger), false, None, None),
            TriggerDecision::Start { manual_token: None }
        );
    }

    #[test]
    fn continuous_mode_with_no_trigger() {
        assert_eq!(
            decide(t(100), None, false, Some(t(0)), None),
            TriggerDecision::Start { manual_token: None }
        );
    }

    #[test]
    fn fresh_manual_token_wins_over_unfired_schedule() {
        let trigger = Trigger {
            schedule: Some("0 0 1 1 *".to_string()),
            manual: Some("v2".to_string()),
        };
        assert_eq!(
            decide(t(100), Some(&trigger), false, Some(t(0)), Some("v1")),
            TriggerDecision::Start {
                manual_token: Some("v2".to_string())
            }
        );
    }

    #[test]
    fn consumed_manual_token_falls_back_to_schedule() {
        let last_sync = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let now = last_sync + chrono::Duration::minutes(20);
        let trigger = Trigger {
            schedule: Some("*/15 * * * *".to_string()),
            manual: Some("v1".to_string()),
        };
        assert_eq!(
            decide(now, Some(&trigger), false, Some(last_sync), Some("v1")),
            TriggerDecision::Start { manual_token: None }
        );
    }

    #[test]
    fn unfired_schedule_defers_with_next_time() {
        let last_sync = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let now = last_sync + chrono::Duration::minutes(5);
        let trigger = Trigger {
            schedule: Some("*/15 * * * *".to_string()),
            manual: None,
        };
        match decide(now, Some(&trigger), false, Some(last_sync), None) {
            TriggerDecision::WaitingForSchedule { next: Some(next) } => {
                assert_eq!(next, last_sync + chrono::Duration::minutes(15));
            }
            other => panic!("expected WaitingForSchedule, got {:?}", other),
        }
    }

    #[test]
    fn consumed_manual_with_no_schedule_waits_for_manual() {
        let last_sync = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let trigger = Trigger {
            schedule: None,
            manual: Some("v1".to_string()),
        };
        assert_eq!(
            decide(t(100), Some(&trigger), false, Some(last_sync), Some("v1")),
            TriggerDecision::WaitingForManual
        );
    }
}
