use serde::{Deserialize, Serialize};

/// Lifecycle position of one attempt.
///
/// `NotStarted` is the only initial phase and `Submitted` is terminal; the only
/// way into `Submitted` is from `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    NotStarted,
    InProgress,
    Submitted,
}

impl SessionPhase {
    #[must_use]
    pub fn accepts_answers(self) -> bool {
        matches!(self, SessionPhase::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_in_progress_accepts_answers() {
        assert!(!SessionPhase::default().accepts_answers());
        assert!(SessionPhase::InProgress.accepts_answers());
        assert!(!SessionPhase::Submitted.accepts_answers());
    }
}
