//! Decision gate.
//!
//! A choice is recorded as *pending* the moment it is made, which closes
//! the gate to further choices; it becomes the committed outcome only when
//! the confirmation timer fires.

use super::state::{DecisionOutcome, DemoSession, Phase};

/// The three resolutions offered at the decision point.
pub const CHOICES: [DecisionOutcome; 3] = [
    DecisionOutcome::Approve,
    DecisionOutcome::Deny,
    DecisionOutcome::Photo,
];

/// Result of offering a choice to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateResponse {
    /// The choice was accepted; the confirmation delay starts now.
    Armed(DecisionOutcome),
    /// A choice was already made; the new one is ignored.
    AlreadyChosen(DecisionOutcome),
    /// The session is not waiting on a decision.
    Closed,
}

/// View of a session's decision point.
#[derive(Debug)]
pub struct DecisionGate<'a> {
    session: &'a mut DemoSession,
}

impl<'a> DecisionGate<'a> {
    /// Opens the gate over `session`.
    pub const fn new(session: &'a mut DemoSession) -> Self {
        Self { session }
    }

    /// Whether a choice can still be made.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.session.phase, Phase::Decision) && self.session.pending_decision.is_none()
    }

    /// Records `outcome` as the pending choice.
    pub const fn choose(&mut self, outcome: DecisionOutcome) -> GateResponse {
        if !matches!(self.session.phase, Phase::Decision) {
            return GateResponse::Closed;
        }
        if let Some(existing) = self.session.pending_decision {
            return GateResponse::AlreadyChosen(existing);
        }
        self.session.pending_decision = Some(outcome);
        GateResponse::Armed(outcome)
    }

    /// Moves the pending choice into the committed outcome.
    ///
    /// Returns `None` when nothing is pending or an outcome already exists.
    pub const fn commit(&mut self) -> Option<DecisionOutcome> {
        if self.session.decision_outcome.is_some() {
            return None;
        }
        let outcome = self.session.pending_decision.take();
        self.session.decision_outcome = outcome;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting_session() -> DemoSession {
        let mut session = DemoSession::new();
        session.phase = Phase::Decision;
        session
    }

    #[test]
    fn test_first_choice_wins() {
        let mut session = waiting_session();
        let mut gate = DecisionGate::new(&mut session);
        assert!(gate.is_open());
        assert_eq!(
            gate.choose(DecisionOutcome::Deny),
            GateResponse::Armed(DecisionOutcome::Deny)
        );
        assert!(!gate.is_open());
        assert_eq!(
            gate.choose(DecisionOutcome::Approve),
            GateResponse::AlreadyChosen(DecisionOutcome::Deny)
        );
        assert_eq!(session.pending_decision, Some(DecisionOutcome::Deny));
        assert!(session.decision_outcome.is_none());
    }

    #[test]
    fn test_commit_moves_pending_to_outcome() {
        let mut session = waiting_session();
        let mut gate = DecisionGate::new(&mut session);
        gate.choose(DecisionOutcome::Photo);
        assert_eq!(gate.commit(), Some(DecisionOutcome::Photo));
        assert_eq!(gate.commit(), None);
        assert_eq!(session.decision_outcome, Some(DecisionOutcome::Photo));
        assert!(session.pending_decision.is_none());
    }

    #[test]
    fn test_gate_closed_outside_decision_phase() {
        let mut session = DemoSession::new();
        let mut gate = DecisionGate::new(&mut session);
        assert!(!gate.is_open());
        assert_eq!(gate.choose(DecisionOutcome::Approve), GateResponse::Closed);
    }

    #[test]
    fn test_choices_are_distinct() {
        assert_eq!(CHOICES.len(), 3);
        assert_ne!(CHOICES[0], CHOICES[1]);
        assert_ne!(CHOICES[1], CHOICES[2]);
    }
}
