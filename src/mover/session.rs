//! The per-sync mover session state machine (spec §5.B):
//! Idle -> Preparing -> Syncing -> Preserving -> Cleaning -> Idle.
//!
//! `step` advances exactly one phase per call; the controller persists the
//! returned phase on the CR (as an annotation, since it's reconciler-private
//! state rather than something users should edit) and calls `step` again on
//! the next reconcile until it sees `Finished`.

use crate::crd::MoverResult;
use crate::error::Result;
use crate::mover::{Mover, MoverContext, MoverRunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Preparing,
    Syncing,
    /// Carries the mover's terminal result forward so it survives into the
    /// phases that run after the worker Job itself is gone.
    Preserving(MoverResult),
    Cleaning(MoverResult),
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Preparing => "Preparing",
            SessionPhase::Syncing => "Syncing",
            SessionPhase::Preserving(_) => "Preserving",
            SessionPhase::Cleaning(_) => "Cleaning",
        }
    }

    pub fn parse(s: &str) -> Option<SessionPhase> {
        match s {
            "Idle" => Some(SessionPhase::Idle),
            "Preparing" => Some(SessionPhase::Preparing),
            "Syncing" => Some(SessionPhase::Syncing),
            // Preserving/Cleaning carry a result that can't round-trip
            // through a bare string; callers resuming mid-session after a
            // restart re-enter at Syncing and let the mover's Job status
            // supply the result again.
            "Preserving" | "Cleaning" => Some(SessionPhase::Syncing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue(SessionPhase),
    Finished(MoverResult),
}

/// Advance the session by exactly one phase.
///
/// `Preserving` is a no-op here by design: the controller is responsible for
/// creating the destination's durable point-in-time image between the
/// `Preserving` and `Cleaning` transitions (it needs access to the volume
/// module and the CR's status, neither of which this driver has), then
/// calls `step` again to move on.
pub async fn step(phase: SessionPhase, mover: &dyn Mover, cx: &MoverContext) -> Result<StepResult> {
    match phase {
        SessionPhase::Idle => {
            mover.prepare(cx).await?;
            Ok(StepResult::Continue(SessionPhase::Preparing))
        }
        SessionPhase::Preparing => {
            mover.prepare(cx).await?;
            Ok(StepResult::Continue(SessionPhase::Syncing))
        }
        SessionPhase::Syncing => match mover.run(cx).await? {
            MoverRunState::InProgress => Ok(StepResult::Continue(SessionPhase::Syncing)),
            MoverRunState::Done(result) => {
                Ok(StepResult::Continue(SessionPhase::Preserving(result)))
            }
        },
        SessionPhase::Preserving(result) => Ok(StepResult::Continue(SessionPhase::Cleaning(result))),
        SessionPhase::Cleaning(result) => {
            mover.cleanup(cx).await?;
            Ok(StepResult::Finished(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_round_trip_for_linear_states() {
        for phase in [SessionPhase::Idle, SessionPhase::Preparing, SessionPhase::Syncing] {
            assert_eq!(SessionPhase::parse(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn resuming_mid_session_reenters_at_syncing() {
        assert_eq!(SessionPhase::parse("Preserving"), Some(SessionPhase::Syncing));
        assert_eq!(SessionPhase::parse("Cleaning"), Some(SessionPhase::Syncing));
    }
}
