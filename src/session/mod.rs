//! Quiz session lifecycle: the four-phase state machine and the per-round
//! press-order accumulator.
//!
//! Everything here is synchronous and free of I/O so transitions can be unit
//! tested without a runtime; the [`runtime`] module decides side effects
//! (controller calls, persistence, audio) from the returned values.

pub mod audio;
pub mod display;
pub mod runtime;

use indexmap::IndexSet;
use thiserror::Error;

/// High-level phases of one quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing on stage yet; the session has not been readied.
    Idle,
    /// Headers visible, waiting for the round to start.
    Ready,
    /// Countdown running, buzzes being collected.
    Running,
    /// Round over; the top-3 ranking is on display.
    Finished,
}

/// User intents that drive the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Leave the idle splash and show the configured stage.
    EnterReady,
    /// Start the countdown for the current question.
    Start,
    /// End the running round before the countdown expires.
    FinishEarly,
    /// Abandon the session state and return to the first question.
    Reset,
    /// Move from the results to the next question.
    NextRound,
}

/// Error returned when an intent cannot be applied in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {intent:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the session was in when the invalid intent arrived.
    pub from: SessionPhase,
    /// The intent that cannot be applied from this phase.
    pub intent: Intent,
}

/// Compute the phase an intent leads to, without touching any state.
pub fn transition(from: SessionPhase, intent: Intent) -> Result<SessionPhase, InvalidTransition> {
    let next = match (from, intent) {
        (SessionPhase::Idle, Intent::EnterReady) => SessionPhase::Ready,
        (SessionPhase::Ready, Intent::Start) => SessionPhase::Running,
        (SessionPhase::Running, Intent::FinishEarly) => SessionPhase::Finished,
        (SessionPhase::Finished, Intent::NextRound) => SessionPhase::Ready,
        (_, Intent::Reset) => SessionPhase::Ready,
        (from, intent) => return Err(InvalidTransition { from, intent }),
    };
    Ok(next)
}

/// Mutable session state: the current phase plus the round accumulator.
///
/// The press order is append-only within one round, deduplicated on the
/// roster index (first arrival wins), and cleared whenever a transition
/// enters `Ready` or starts a round.
#[derive(Debug, Clone)]
pub struct Session {
    phase: SessionPhase,
    time_left: u32,
    press_order: IndexSet<usize>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Fresh session in the idle phase.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            time_left: 0,
            press_order: IndexSet::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Seconds left on the countdown.
    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    /// Press order recorded so far, as roster indices in first-buzz order.
    pub fn press_order(&self) -> &IndexSet<usize> {
        &self.press_order
    }

    /// Apply a user intent. `timeout_seconds` is the freshly read configured
    /// round length; every transition that (re)enters a round resets the
    /// countdown to it and clears the press order.
    pub fn apply(
        &mut self,
        intent: Intent,
        timeout_seconds: u32,
    ) -> Result<SessionPhase, InvalidTransition> {
        let next = transition(self.phase, intent)?;
        match intent {
            Intent::Start | Intent::Reset | Intent::NextRound => {
                self.press_order.clear();
                self.time_left = timeout_seconds;
            }
            Intent::EnterReady => {
                self.time_left = timeout_seconds;
            }
            Intent::FinishEarly => {}
        }
        self.phase = next;
        Ok(next)
    }

    /// One countdown tick. Only meaningful while running; returns `true` when
    /// this tick finished the round.
    pub fn tick(&mut self) -> bool {
        if self.phase != SessionPhase::Running {
            return false;
        }
        if self.time_left > 0 {
            self.time_left -= 1;
        }
        if self.time_left == 0 {
            self.phase = SessionPhase::Finished;
            return true;
        }
        false
    }

    /// Record an inbound buzz. Accepted in every phase so a late-arriving
    /// network event is not dropped; never changes the phase. Returns `true`
    /// when the press is fresh (first buzz for this index this round).
    pub fn record_buzz(&mut self, team_index: usize) -> bool {
        self.press_order.insert(team_index)
    }

    /// Apply an authoritative round result: replace the press order with
    /// `top3` and force the finished phase, overriding any concurrent local
    /// countdown expiry.
    pub fn apply_result(&mut self, top3: &[usize]) {
        self.press_order = top3.iter().copied().collect();
        self.phase = SessionPhase::Finished;
    }

    /// Drop the current round without leaving the session; used when a roster
    /// edit invalidates the positional indices collected so far.
    pub fn invalidate_round(&mut self, timeout_seconds: u32) {
        self.press_order.clear();
        self.time_left = timeout_seconds;
        self.phase = SessionPhase::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_session(timeout: u32) -> Session {
        let mut session = Session::new();
        session.apply(Intent::EnterReady, timeout).unwrap();
        session.apply(Intent::Start, timeout).unwrap();
        session
    }

    #[test]
    fn initial_state_is_idle() {
        let session = Session::new();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.press_order().is_empty());
    }

    #[test]
    fn full_happy_path_through_one_round() {
        let mut session = Session::new();
        assert_eq!(
            session.apply(Intent::EnterReady, 10).unwrap(),
            SessionPhase::Ready
        );
        assert_eq!(session.apply(Intent::Start, 10).unwrap(), SessionPhase::Running);
        assert_eq!(session.time_left(), 10);
        assert_eq!(
            session.apply(Intent::FinishEarly, 10).unwrap(),
            SessionPhase::Finished
        );
        assert_eq!(
            session.apply(Intent::NextRound, 10).unwrap(),
            SessionPhase::Ready
        );
    }

    #[test]
    fn reset_is_valid_from_every_phase() {
        let idle = Session::new();
        let mut ready = Session::new();
        ready.apply(Intent::EnterReady, 5).unwrap();
        let running = running_session(5);
        let mut finished = running_session(5);
        finished.apply(Intent::FinishEarly, 5).unwrap();

        for mut session in [idle, ready, running, finished] {
            session.record_buzz(1);
            assert_eq!(session.apply(Intent::Reset, 5).unwrap(), SessionPhase::Ready);
            assert!(session.press_order().is_empty());
            assert_eq!(session.time_left(), 5);
        }
    }

    #[test]
    fn invalid_intents_are_rejected() {
        let mut session = Session::new();
        let err = session.apply(Intent::Start, 10).unwrap_err();
        assert_eq!(err.from, SessionPhase::Idle);
        assert_eq!(err.intent, Intent::Start);

        let mut session = running_session(10);
        assert!(session.apply(Intent::NextRound, 10).is_err());
        assert!(session.apply(Intent::Start, 10).is_err());
    }

    #[test]
    fn duplicate_buzzes_keep_first_arrival_order() {
        let mut session = running_session(10);
        assert!(session.record_buzz(2));
        assert!(session.record_buzz(0));
        assert!(!session.record_buzz(2));
        assert!(session.record_buzz(4));
        assert!(!session.record_buzz(0));
        let order: Vec<usize> = session.press_order().iter().copied().collect();
        assert_eq!(order, vec![2, 0, 4]);
        assert_eq!(session.phase(), SessionPhase::Running);
    }

    #[test]
    fn buzzes_are_accepted_outside_running() {
        let mut session = Session::new();
        assert!(session.record_buzz(1));
        assert_eq!(session.phase(), SessionPhase::Idle);

        let mut session = running_session(10);
        session.apply(Intent::FinishEarly, 10).unwrap();
        assert!(session.record_buzz(3));
        assert_eq!(session.phase(), SessionPhase::Finished);
    }

    #[test]
    fn starting_a_round_clears_stale_state() {
        let mut session = running_session(10);
        session.record_buzz(1);
        session.record_buzz(2);
        session.apply(Intent::FinishEarly, 10).unwrap();
        session.apply(Intent::NextRound, 10).unwrap();
        assert!(session.press_order().is_empty());

        // Leftovers from a previous round never leak into a new one, and the
        // countdown picks up the timeout configured at start time.
        session.record_buzz(7);
        session.apply(Intent::Start, 25).unwrap();
        assert!(session.press_order().is_empty());
        assert_eq!(session.time_left(), 25);
    }

    #[test]
    fn countdown_finishes_at_zero_keeping_the_order() {
        let mut session = running_session(3);
        session.record_buzz(2);
        session.record_buzz(0);

        assert!(!session.tick());
        assert!(!session.tick());
        assert!(session.tick());
        assert_eq!(session.phase(), SessionPhase::Finished);
        let order: Vec<usize> = session.press_order().iter().copied().collect();
        assert_eq!(order, vec![2, 0]);
    }

    #[test]
    fn zero_timeout_round_finishes_on_first_tick() {
        let mut session = running_session(0);
        assert!(session.tick());
        assert_eq!(session.phase(), SessionPhase::Finished);
    }

    #[test]
    fn ticks_outside_running_do_nothing() {
        let mut session = Session::new();
        session.apply(Intent::EnterReady, 5).unwrap();
        assert!(!session.tick());
        assert_eq!(session.time_left(), 5);
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[test]
    fn result_replaces_order_and_forces_finished() {
        let mut session = running_session(10);
        session.record_buzz(5);
        session.record_buzz(6);

        session.apply_result(&[4, 1, 3]);

        assert_eq!(session.phase(), SessionPhase::Finished);
        let order: Vec<usize> = session.press_order().iter().copied().collect();
        assert_eq!(order, vec![4, 1, 3]);
        // Still time on the clock: the result won anyway.
        assert!(session.time_left() > 0);
    }

    #[test]
    fn invalidated_round_returns_to_ready_empty() {
        let mut session = running_session(10);
        session.record_buzz(1);
        session.invalidate_round(10);
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert!(session.press_order().is_empty());
    }
}
