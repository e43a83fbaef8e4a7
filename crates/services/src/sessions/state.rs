use std::collections::BTreeSet;
use std::sync::Arc;

use listening_core::model::{AnswerLedger, QuestionId, QuestionSet, SessionPhase};
use tracing::{debug, info};

use super::progress::SessionProgress;
use crate::error::SessionError;
use crate::navigation::Cursor;

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    User,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
    Select { question: QuestionId, option: String },
    GoTo(isize),
    Next,
    Previous,
    ToggleFlag(QuestionId),
    Tick(u32),
    Submit(SubmitTrigger),
}

/// Frozen inputs for scoring, taken at the moment the session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submission {
    pub trigger: SubmitTrigger,
    pub ledger: AnswerLedger,
    pub time_spent_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    Started { duration_secs: u32 },
    Answered { previous: Option<String> },
    Moved(bool),
    Flagged(bool),
    Ticked,
    Submitted(Submission),
    /// A late trigger after the session already closed.
    Ignored,
}

/// Everything mutable about one attempt.
///
/// Shared between the controller and the timer callbacks; every change goes
/// through [`SessionState::apply`] under one lock, which is what makes the
/// user and expiry submissions mutually exclusive.
#[derive(Debug)]
pub(crate) struct SessionState {
    set: Arc<QuestionSet>,
    phase: SessionPhase,
    ledger: AnswerLedger,
    cursor: Cursor,
    flagged: BTreeSet<QuestionId>,
    declared_secs: u32,
    remaining_secs: u32,
    submitted_by: Option<SubmitTrigger>,
}

impl SessionState {
    pub(crate) fn new(set: Arc<QuestionSet>) -> Self {
        let declared_secs = set.declared_duration_secs();
        let cursor = Cursor::new(set.len(), 0);
        Self {
            set,
            phase: SessionPhase::NotStarted,
            ledger: AnswerLedger::new(),
            cursor,
            flagged: BTreeSet::new(),
            declared_secs,
            remaining_secs: declared_secs,
            submitted_by: None,
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    pub(crate) fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub(crate) fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub(crate) fn submitted_by(&self) -> Option<SubmitTrigger> {
        self.submitted_by
    }

    pub(crate) fn is_flagged(&self, question: QuestionId) -> bool {
        self.flagged.contains(&question)
    }

    pub(crate) fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.set.len(),
            answered: self.ledger.answered_count(),
            flagged: self.flagged.len(),
            current_index: self.cursor.index(),
            remaining_secs: self.remaining_secs,
            phase: self.phase,
        }
    }

    fn require_in_progress(&self) -> Result<(), SessionError> {
        if self.phase.accepts_answers() {
            Ok(())
        } else {
            Err(SessionError::NotInProgress)
        }
    }

    fn require_known(&self, question: QuestionId) -> Result<(), SessionError> {
        if self.set.position_of(question).is_some() {
            Ok(())
        } else {
            Err(SessionError::UnknownQuestion(question))
        }
    }

    /// The single transition function of a session.
    pub(crate) fn apply(&mut self, command: Command) -> Result<Transition, SessionError> {
        match command {
            Command::Start => {
                if self.phase != SessionPhase::NotStarted {
                    return Err(SessionError::AlreadyStarted);
                }
                self.phase = SessionPhase::InProgress;
                self.remaining_secs = self.declared_secs;
                info!(test_id = %self.set.info().id, duration_secs = self.declared_secs, "session started");
                Ok(Transition::Started {
                    duration_secs: self.declared_secs,
                })
            }
            Command::Select { question, option } => {
                self.require_in_progress()?;
                self.require_known(question)?;
                let previous = self.ledger.set(question, option);
                Ok(Transition::Answered { previous })
            }
            Command::GoTo(target) => {
                self.require_in_progress()?;
                Ok(Transition::Moved(self.cursor.go_to(target)))
            }
            Command::Next => {
                self.require_in_progress()?;
                Ok(Transition::Moved(self.cursor.next()))
            }
            Command::Previous => {
                self.require_in_progress()?;
                Ok(Transition::Moved(self.cursor.previous()))
            }
            Command::ToggleFlag(question) => {
                self.require_in_progress()?;
                self.require_known(question)?;
                let flagged = if self.flagged.remove(&question) {
                    false
                } else {
                    self.flagged.insert(question);
                    true
                };
                Ok(Transition::Flagged(flagged))
            }
            Command::Tick(remaining) => {
                if self.phase != SessionPhase::InProgress {
                    return Ok(Transition::Ignored);
                }
                self.remaining_secs = self.remaining_secs.min(remaining);
                Ok(Transition::Ticked)
            }
            Command::Submit(trigger) => match self.phase {
                SessionPhase::NotStarted => Err(SessionError::NotInProgress),
                SessionPhase::Submitted => {
                    debug!(?trigger, "session already submitted; ignoring");
                    Ok(Transition::Ignored)
                }
                SessionPhase::InProgress => {
                    if trigger == SubmitTrigger::Expired {
                        self.remaining_secs = 0;
                    }
                    self.phase = SessionPhase::Submitted;
                    self.submitted_by = Some(trigger);
                    let time_spent_secs = self.declared_secs.saturating_sub(self.remaining_secs);
                    info!(
                        test_id = %self.set.info().id,
                        ?trigger,
                        answered = self.ledger.answered_count(),
                        time_spent_secs,
                        "session submitted"
                    );
                    Ok(Transition::Submitted(Submission {
                        trigger,
                        ledger: self.ledger.clone(),
                        time_spent_secs,
                    }))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listening_core::model::QuestionSet;

    const DOC: &str = r#"{"testInfo":{"id":"t1","durationLabel":"2 minutes"},
        "questions":[{"id":1,"correctAnswer":"A"},{"id":2,"correctAnswer":"B"},{"id":3,"correctAnswer":"C"}]}"#;

    fn state() -> SessionState {
        SessionState::new(Arc::new(QuestionSet::from_json(DOC).unwrap()))
    }

    fn select(id: u32, option: &str) -> Command {
        Command::Select {
            question: QuestionId::new(id),
            option: option.into(),
        }
    }

    #[test]
    fn answers_are_refused_outside_in_progress() {
        let mut s = state();
        assert!(matches!(s.apply(select(1, "A")), Err(SessionError::NotInProgress)));

        s.apply(Command::Start).unwrap();
        s.apply(select(1, "A")).unwrap();
        s.apply(Command::Submit(SubmitTrigger::User)).unwrap();
        assert!(matches!(s.apply(select(1, "B")), Err(SessionError::NotInProgress)));
        assert_eq!(s.ledger().get(QuestionId::new(1)), Some("A"));
    }

    #[test]
    fn overwrite_keeps_last_answer() {
        let mut s = state();
        s.apply(Command::Start).unwrap();
        s.apply(select(2, "A")).unwrap();
        let t = s.apply(select(2, "C")).unwrap();
        assert_eq!(t, Transition::Answered { previous: Some("A".into()) });
        assert_eq!(s.ledger().get(QuestionId::new(2)), Some("C"));
        assert_eq!(s.ledger().answered_count(), 1);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut s = state();
        s.apply(Command::Start).unwrap();
        assert!(matches!(
            s.apply(select(99, "A")),
            Err(SessionError::UnknownQuestion(id)) if id == QuestionId::new(99)
        ));
    }

    #[test]
    fn second_submit_is_ignored() {
        let mut s = state();
        s.apply(Command::Start).unwrap();
        s.apply(Command::Tick(100)).unwrap();

        let first = s.apply(Command::Submit(SubmitTrigger::User)).unwrap();
        let Transition::Submitted(submission) = first else {
            panic!("expected submission, got {first:?}");
        };
        assert_eq!(submission.time_spent_secs, 20);

        assert_eq!(
            s.apply(Command::Submit(SubmitTrigger::Expired)).unwrap(),
            Transition::Ignored
        );
        assert_eq!(s.phase(), SessionPhase::Submitted);
        assert_eq!(s.submitted_by(), Some(SubmitTrigger::User));
    }

    #[test]
    fn expiry_spends_the_whole_duration() {
        let mut s = state();
        s.apply(Command::Start).unwrap();
        s.apply(Command::Tick(1)).unwrap();
        let Ok(Transition::Submitted(submission)) = s.apply(Command::Submit(SubmitTrigger::Expired))
        else {
            panic!("expiry should submit");
        };
        assert_eq!(submission.time_spent_secs, 120);
    }

    #[test]
    fn ticks_never_raise_remaining() {
        let mut s = state();
        s.apply(Command::Start).unwrap();
        s.apply(Command::Tick(50)).unwrap();
        s.apply(Command::Tick(80)).unwrap();
        assert_eq!(s.remaining_secs(), 50);
    }

    #[test]
    fn start_twice_is_an_error_and_navigation_is_bounded() {
        let mut s = state();
        assert!(matches!(s.apply(Command::Next), Err(SessionError::NotInProgress)));
        s.apply(Command::Start).unwrap();
        assert!(matches!(s.apply(Command::Start), Err(SessionError::AlreadyStarted)));

        assert_eq!(s.apply(Command::Previous).unwrap(), Transition::Moved(false));
        assert_eq!(s.apply(Command::GoTo(2)).unwrap(), Transition::Moved(true));
        assert_eq!(s.apply(Command::Next).unwrap(), Transition::Moved(false));
        assert_eq!(s.apply(Command::GoTo(-1)).unwrap(), Transition::Moved(false));
        assert_eq!(s.cursor().index(), 2);
    }

    #[test]
    fn flags_toggle_without_touching_answers() {
        let mut s = state();
        s.apply(Command::Start).unwrap();
        let q = QuestionId::new(3);
        assert_eq!(s.apply(Command::ToggleFlag(q)).unwrap(), Transition::Flagged(true));
        assert!(s.is_flagged(q));
        assert_eq!(s.apply(Command::ToggleFlag(q)).unwrap(), Transition::Flagged(false));
        assert!(s.ledger().is_empty());
        assert_eq!(s.progress().flagged, 0);
    }
}
