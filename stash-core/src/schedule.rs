//! Sync scheduling state machine.
//!
//! This module provides a pure, side-effect-free state machine for deciding
//! *when* a sync cycle runs. It takes events as input and produces a new
//! state plus a list of actions to execute.
//!
//! The actual timers and provider calls are performed by the orchestrator in
//! `stash-sync`, not by this module. This enables instant unit testing of
//! the debounce semantics without clocks or mocks.
//!
//! Semantics:
//! - Every local change re-arms the quiet timer, so a burst of writes
//!   produces at most one cycle per quiet period.
//! - Cycles never overlap. Triggers that land mid-cycle queue at most one
//!   follow-up cycle.
//! - An interval tick or manual request during the quiet period starts a
//!   cycle immediately (the cycle's push covers the pending change) and
//!   disarms the quiet timer.

/// Why a sync cycle was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The fixed interval timer fired.
    Interval,
    /// A burst of local writes went quiet.
    LocalChange,
    /// An external caller asked for a sync now.
    Manual,
}

/// Scheduling state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleState {
    /// Nothing pending.
    Idle,
    /// Local writes happened; waiting for the quiet period to elapse.
    Debouncing,
    /// A cycle is running.
    Syncing {
        /// At most one follow-up cycle, queued by triggers that landed
        /// mid-cycle.
        queued: Option<SyncTrigger>,
    },
}

impl ScheduleState {
    /// Create a new state machine with nothing pending.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The orchestrator is
    /// responsible for executing the returned actions.
    pub fn on_event(self, event: ScheduleEvent) -> (Self, Vec<ScheduleAction>) {
        match (self, event) {
            // From Idle
            (Self::Idle, ScheduleEvent::LocalChange) => {
                (Self::Debouncing, vec![ScheduleAction::ArmQuietTimer])
            }
            (Self::Idle, ScheduleEvent::IntervalTick) => (
                Self::Syncing { queued: None },
                vec![ScheduleAction::BeginCycle(SyncTrigger::Interval)],
            ),
            (Self::Idle, ScheduleEvent::ManualRequested) => (
                Self::Syncing { queued: None },
                vec![ScheduleAction::BeginCycle(SyncTrigger::Manual)],
            ),

            // From Debouncing
            (Self::Debouncing, ScheduleEvent::LocalChange) => {
                (Self::Debouncing, vec![ScheduleAction::ArmQuietTimer])
            }
            (Self::Debouncing, ScheduleEvent::QuietElapsed) => (
                Self::Syncing { queued: None },
                vec![ScheduleAction::BeginCycle(SyncTrigger::LocalChange)],
            ),
            (Self::Debouncing, ScheduleEvent::IntervalTick) => (
                Self::Syncing { queued: None },
                vec![
                    ScheduleAction::DisarmQuietTimer,
                    ScheduleAction::BeginCycle(SyncTrigger::Interval),
                ],
            ),
            (Self::Debouncing, ScheduleEvent::ManualRequested) => (
                Self::Syncing { queued: None },
                vec![
                    ScheduleAction::DisarmQuietTimer,
                    ScheduleAction::BeginCycle(SyncTrigger::Manual),
                ],
            ),

            // From Syncing: changes keep debouncing, everything else queues
            // at most one follow-up.
            (Self::Syncing { queued }, ScheduleEvent::LocalChange) => (
                Self::Syncing { queued },
                vec![ScheduleAction::ArmQuietTimer],
            ),
            (Self::Syncing { queued }, ScheduleEvent::QuietElapsed) => (
                Self::Syncing {
                    queued: Some(queued.unwrap_or(SyncTrigger::LocalChange)),
                },
                vec![],
            ),
            (Self::Syncing { queued }, ScheduleEvent::IntervalTick) => (
                Self::Syncing {
                    queued: Some(queued.unwrap_or(SyncTrigger::Interval)),
                },
                vec![],
            ),
            (Self::Syncing { queued }, ScheduleEvent::ManualRequested) => (
                Self::Syncing {
                    queued: Some(queued.unwrap_or(SyncTrigger::Manual)),
                },
                vec![],
            ),
            (Self::Syncing { queued: Some(next) }, ScheduleEvent::CycleFinished) => (
                Self::Syncing { queued: None },
                vec![ScheduleAction::BeginCycle(next)],
            ),
            (Self::Syncing { queued: None }, ScheduleEvent::CycleFinished) => {
                (Self::Idle, vec![])
            }

            // Stale events (e.g. a quiet timer that fired after its state
            // moved on) - stay in the current state.
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a cycle is currently running.
    pub fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing { .. })
    }
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEvent {
    /// The local store reported a write to one of the lists.
    LocalChange,
    /// The quiet-period timer elapsed without further changes.
    QuietElapsed,
    /// The fixed interval timer fired.
    IntervalTick,
    /// An external caller requested a sync.
    ManualRequested,
    /// The running cycle finished (successfully or not).
    CycleFinished,
}

/// Actions to be executed by the orchestrator.
///
/// These are instructions, not side effects. The orchestrator interprets
/// them and performs the actual timer and provider work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAction {
    /// (Re)start the quiet-period timer from zero.
    ArmQuietTimer,
    /// Cancel a pending quiet-period timer.
    DisarmQuietTimer,
    /// Run one sync cycle across the enabled providers.
    BeginCycle(SyncTrigger),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(ScheduleState::new(), ScheduleState::Idle);
        assert!(!ScheduleState::new().is_syncing());
    }

    #[test]
    fn local_change_arms_quiet_timer() {
        let (state, actions) = ScheduleState::Idle.on_event(ScheduleEvent::LocalChange);
        assert_eq!(state, ScheduleState::Debouncing);
        assert_eq!(actions, vec![ScheduleAction::ArmQuietTimer]);
    }

    #[test]
    fn every_change_in_a_burst_rearms_the_timer() {
        let mut state = ScheduleState::new();
        for _ in 0..5 {
            let (next, actions) = state.on_event(ScheduleEvent::LocalChange);
            assert_eq!(next, ScheduleState::Debouncing);
            assert_eq!(actions, vec![ScheduleAction::ArmQuietTimer]);
            state = next;
        }
    }

    #[test]
    fn quiet_period_elapsing_begins_one_cycle() {
        let (state, _) = ScheduleState::Idle.on_event(ScheduleEvent::LocalChange);
        let (state, actions) = state.on_event(ScheduleEvent::QuietElapsed);

        assert!(state.is_syncing());
        assert_eq!(
            actions,
            vec![ScheduleAction::BeginCycle(SyncTrigger::LocalChange)]
        );
    }

    #[test]
    fn stale_quiet_timer_in_idle_is_ignored() {
        let (state, actions) = ScheduleState::Idle.on_event(ScheduleEvent::QuietElapsed);
        assert_eq!(state, ScheduleState::Idle);
        assert!(actions.is_empty());
    }

    #[test]
    fn interval_tick_from_idle_begins_cycle() {
        let (state, actions) = ScheduleState::Idle.on_event(ScheduleEvent::IntervalTick);
        assert!(state.is_syncing());
        assert_eq!(
            actions,
            vec![ScheduleAction::BeginCycle(SyncTrigger::Interval)]
        );
    }

    #[test]
    fn interval_during_debounce_subsumes_the_pending_push() {
        let (state, _) = ScheduleState::Idle.on_event(ScheduleEvent::LocalChange);
        let (state, actions) = state.on_event(ScheduleEvent::IntervalTick);

        assert_eq!(state, ScheduleState::Syncing { queued: None });
        assert_eq!(
            actions,
            vec![
                ScheduleAction::DisarmQuietTimer,
                ScheduleAction::BeginCycle(SyncTrigger::Interval),
            ]
        );
    }

    #[test]
    fn triggers_during_a_cycle_queue_exactly_one_follow_up() {
        let state = ScheduleState::Syncing { queued: None };

        // First mid-cycle trigger queues.
        let (state, actions) = state.on_event(ScheduleEvent::IntervalTick);
        assert_eq!(
            state,
            ScheduleState::Syncing {
                queued: Some(SyncTrigger::Interval)
            }
        );
        assert!(actions.is_empty());

        // Later triggers do not replace it.
        let (state, _) = state.on_event(ScheduleEvent::ManualRequested);
        assert_eq!(
            state,
            ScheduleState::Syncing {
                queued: Some(SyncTrigger::Interval)
            }
        );

        // The queued cycle starts when the running one finishes.
        let (state, actions) = state.on_event(ScheduleEvent::CycleFinished);
        assert_eq!(state, ScheduleState::Syncing { queued: None });
        assert_eq!(
            actions,
            vec![ScheduleAction::BeginCycle(SyncTrigger::Interval)]
        );
    }

    #[test]
    fn change_during_cycle_keeps_debouncing_for_later() {
        let state = ScheduleState::Syncing { queued: None };
        let (state, actions) = state.on_event(ScheduleEvent::LocalChange);

        // The timer re-arms; if it elapses before the cycle ends the
        // follow-up queues, otherwise it starts a fresh cycle from Idle.
        assert_eq!(actions, vec![ScheduleAction::ArmQuietTimer]);

        let (state, actions) = state.on_event(ScheduleEvent::QuietElapsed);
        assert_eq!(
            state,
            ScheduleState::Syncing {
                queued: Some(SyncTrigger::LocalChange)
            }
        );
        assert!(actions.is_empty());

        let (_, actions) = state.on_event(ScheduleEvent::CycleFinished);
        assert_eq!(
            actions,
            vec![ScheduleAction::BeginCycle(SyncTrigger::LocalChange)]
        );
    }

    #[test]
    fn cycle_finishing_with_nothing_queued_returns_to_idle() {
        let state = ScheduleState::Syncing { queued: None };
        let (state, actions) = state.on_event(ScheduleEvent::CycleFinished);
        assert_eq!(state, ScheduleState::Idle);
        assert!(actions.is_empty());
    }

    #[test]
    fn manual_request_starts_immediately_when_not_syncing() {
        let (state, actions) = ScheduleState::Idle.on_event(ScheduleEvent::ManualRequested);
        assert!(state.is_syncing());
        assert_eq!(actions, vec![ScheduleAction::BeginCycle(SyncTrigger::Manual)]);

        let (state, _) = ScheduleState::Idle.on_event(ScheduleEvent::LocalChange);
        let (state, actions) = state.on_event(ScheduleEvent::ManualRequested);
        assert!(state.is_syncing());
        assert_eq!(
            actions,
            vec![
                ScheduleAction::DisarmQuietTimer,
                ScheduleAction::BeginCycle(SyncTrigger::Manual),
            ]
        );
    }

    #[test]
    fn full_burst_then_quiet_then_cycle_flow() {
        let mut state = ScheduleState::new();

        // Burst of three writes.
        for _ in 0..3 {
            let (next, _) = state.on_event(ScheduleEvent::LocalChange);
            state = next;
        }
        assert_eq!(state, ScheduleState::Debouncing);

        // Quiet period elapses, cycle runs, nothing else happens.
        let (state, _) = state.on_event(ScheduleEvent::QuietElapsed);
        assert!(state.is_syncing());
        let (state, _) = state.on_event(ScheduleEvent::CycleFinished);
        assert_eq!(state, ScheduleState::Idle);
    }
}
