use listening_core::model::MediaUri;

/// Normalized lifecycle of the playback resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error(String),
}

impl PlaybackState {
    /// Whether transport controls (play, seek) apply in this state.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Ended
        )
    }
}

/// Everything a control surface needs to render the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub source: Option<MediaUri>,
    /// Seconds from the start of the media.
    pub position: f64,
    /// Total length in seconds; `None` until metadata is available.
    pub duration: Option<f64>,
    pub volume: f64,
    pub rate: f64,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            source: None,
            position: 0.0,
            duration: None,
            volume: 1.0,
            rate: 1.0,
        }
    }
}
