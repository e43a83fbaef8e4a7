use listening_core::model::SessionPhase;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub flagged: usize,
    pub current_index: usize,
    pub remaining_secs: u32,
    pub phase: SessionPhase,
}

impl SessionProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }

    /// Remaining time as `MM:SS`.
    #[must_use]
    pub fn clock(&self) -> String {
        format_clock(self.remaining_secs)
    }
}

/// Format seconds as `MM:SS`; minutes are not wrapped into hours.
#[must_use]
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(605), "10:05");
        assert_eq!(format_clock(7_200), "120:00");
    }
}
