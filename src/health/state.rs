//! Backend health state machine.
//!
//! # States
//! - Unknown: freshly configured, routable, never probed
//! - Up: backend receives traffic
//! - Down: backend excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Unknown/Down → Up:  consecutive successes >= passes_to_up
//! Unknown/Up → Down:  consecutive failures >= fails_to_down
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - A success clears the failure streak and vice versa
//! - Counters are not reset on transition; a streak past the threshold
//!   keeps producing the same (idempotent) verdict

use crate::config::HealthSettings;
use crate::load_balancer::HealthState;

/// Consecutive probe results for one backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProbeCounters {
    pub successes: u32,
    pub failures: u32,
}

impl ProbeCounters {
    pub fn record(&mut self, success: bool) {
        if success {
            self.successes = self.successes.saturating_add(1);
            self.failures = 0;
        } else {
            self.failures = self.failures.saturating_add(1);
            self.successes = 0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    MarkUp,
    MarkDown,
}

/// Decide whether the counters warrant a transition away from `current`.
pub fn evaluate(current: HealthState, counters: &ProbeCounters, settings: &HealthSettings) -> Option<Verdict> {
    if current != HealthState::Up && counters.successes >= settings.passes_to_up {
        return Some(Verdict::MarkUp);
    }
    if current != HealthState::Down && counters.failures >= settings.fails_to_down {
        return Some(Verdict::MarkDown);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(fails: u32, passes: u32) -> HealthSettings {
        HealthSettings {
            fails_to_down: fails,
            passes_to_up: passes,
            ..HealthSettings::default()
        }
    }

    /// Feed probe results through the state machine, returning the final state.
    fn replay(start: HealthState, results: &[bool], settings: &HealthSettings) -> HealthState {
        let mut state = start;
        let mut counters = ProbeCounters::default();
        for &ok in results {
            counters.record(ok);
            match evaluate(state, &counters, settings) {
                Some(Verdict::MarkUp) => state = HealthState::Up,
                Some(Verdict::MarkDown) => state = HealthState::Down,
                None => {}
            }
        }
        state
    }

    #[test]
    fn down_after_consecutive_failures() {
        let s = settings(3, 2);
        assert_eq!(replay(HealthState::Up, &[false, false], &s), HealthState::Up);
        assert_eq!(replay(HealthState::Up, &[false, false, false], &s), HealthState::Down);
    }

    #[test]
    fn up_after_consecutive_successes() {
        let s = settings(3, 2);
        assert_eq!(replay(HealthState::Down, &[true], &s), HealthState::Down);
        assert_eq!(replay(HealthState::Down, &[true, true], &s), HealthState::Up);
    }

    #[test]
    fn unknown_moves_either_way() {
        let s = settings(1, 1);
        assert_eq!(replay(HealthState::Unknown, &[true], &s), HealthState::Up);
        assert_eq!(replay(HealthState::Unknown, &[false], &s), HealthState::Down);
        assert_eq!(replay(HealthState::Unknown, &[], &s), HealthState::Unknown);
    }

    #[test]
    fn alternating_results_never_flip() {
        let s = settings(2, 2);
        let pattern = [false, true, false, true, false, true, false, true];
        assert_eq!(replay(HealthState::Up, &pattern, &s), HealthState::Up);
        assert_eq!(replay(HealthState::Down, &pattern, &s), HealthState::Down);
    }

    #[test]
    fn opposite_result_resets_streak() {
        let mut counters = ProbeCounters::default();
        counters.record(false);
        counters.record(false);
        counters.record(true);
        assert_eq!(counters, ProbeCounters { successes: 1, failures: 0 });
    }

    #[test]
    fn no_verdict_when_already_there() {
        let s = settings(1, 1);
        let fails = ProbeCounters { successes: 0, failures: 5 };
        assert_eq!(evaluate(HealthState::Down, &fails, &s), None);
        let passes = ProbeCounters { successes: 5, failures: 0 };
        assert_eq!(evaluate(HealthState::Up, &passes, &s), None);
    }
}
