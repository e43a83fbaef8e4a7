//! Playback resource wrapper.
//!
//! A [`Player`] owns at most one live [`MediaResource`] opened through a
//! [`MediaBackend`]. Backend events are tagged with the load generation that
//! produced them, and events from torn-down resources are discarded.

mod backend;
mod file;
mod player;
mod simulated;
mod state;

pub use backend::{MediaBackend, MediaEvent, MediaEventSink, MediaResource, PlayRejection};
pub use file::{FileBackend, TIME_UPDATE_INTERVAL};
pub use player::{
    AUTOPLAY_DELAY, AUTOPLAY_RETRY_DELAY, LoadOptions, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE,
    Player,
};
pub use simulated::SimulatedBackend;
pub use state::{PlaybackSnapshot, PlaybackState};
