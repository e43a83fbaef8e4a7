use async_trait::async_trait;
use listening_core::model::MediaUri;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::PlaybackError;

/// Notifications a media resource reports asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    MetadataLoaded { duration: f64 },
    TimeUpdate { position: f64 },
    Playing,
    Paused,
    Ended,
    Failed(String),
}

/// Reasons a play request can be refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlayRejection {
    /// Platform policy forbids starting without a user gesture.
    #[error("playback requires user interaction")]
    NotAllowed,
    /// The request was cut short by a pause, source change or teardown.
    #[error("play request was interrupted")]
    Aborted,
    #[error("{0}")]
    Failed(String),
}

/// Event channel handed to a resource when it is opened.
///
/// Every event is stamped with the generation of the load that created the
/// resource so the player can ignore events from replaced resources.
#[derive(Debug, Clone)]
pub struct MediaEventSink {
    generation: u64,
    tx: UnboundedSender<(u64, MediaEvent)>,
}

impl MediaEventSink {
    pub(crate) fn new(generation: u64, tx: UnboundedSender<(u64, MediaEvent)>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event; returns `false` once the owning player is gone.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

/// One opened, audio-capable handle.
#[async_trait]
pub trait MediaResource: Send {
    /// Begin or resume playback.
    ///
    /// # Errors
    ///
    /// Returns `PlayRejection` when the platform refuses or interrupts the request.
    async fn play(&mut self) -> Result<(), PlayRejection>;

    fn pause(&mut self);

    fn seek(&mut self, position: f64);

    fn position(&self) -> f64;

    fn set_volume(&mut self, volume: f64);

    fn set_rate(&mut self, rate: f64);

    /// Stop reporting events and release the underlying handle.
    fn detach(&mut self);
}

/// Factory for media resources.
pub trait MediaBackend: Send + Sync {
    /// Open `source`; metadata and failures arrive later through `events`.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Load` if the source cannot be opened at all.
    fn open(
        &self,
        source: &MediaUri,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaResource>, PlaybackError>;
}
