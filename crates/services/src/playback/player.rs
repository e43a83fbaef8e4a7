use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use listening_core::model::MediaUri;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::backend::{MediaBackend, MediaEvent, MediaEventSink, MediaResource, PlayRejection};
use super::state::{PlaybackSnapshot, PlaybackState};
use crate::error::PlaybackError;

/// Delay between metadata arrival and the first autoplay attempt.
pub const AUTOPLAY_DELAY: Duration = Duration::from_millis(100);
/// Delay before the single retry after an autoplay rejection.
pub const AUTOPLAY_RETRY_DELAY: Duration = Duration::from_millis(1_000);

pub const MIN_PLAYBACK_RATE: f64 = 0.25;
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Try to start playback once the media is ready.
    pub autoplay: bool,
}

impl LoadOptions {
    #[must_use]
    pub fn autoplay() -> Self {
        Self { autoplay: true }
    }
}

type EventMessage = (u64, MediaEvent);

/// Owns one playback resource at a time and keeps its state observable.
///
/// State changes are published on a `watch` channel (see [`Player::subscribe`]).
/// Backend events are applied when the owner calls [`Player::next_event`] or
/// [`Player::drain_events`], which is also where pending autoplay runs.
pub struct Player {
    backend: Arc<dyn MediaBackend>,
    resource: Option<Box<dyn MediaResource>>,
    generation: u64,
    events_tx: mpsc::UnboundedSender<EventMessage>,
    events_rx: mpsc::UnboundedReceiver<EventMessage>,
    snapshot: PlaybackSnapshot,
    publisher: watch::Sender<PlaybackSnapshot>,
    autoplay_pending: bool,
}

impl Player {
    #[must_use]
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let snapshot = PlaybackSnapshot::default();
        let (publisher, _) = watch::channel(snapshot.clone());
        Self {
            backend,
            resource: None,
            generation: 0,
            events_tx,
            events_rx,
            snapshot,
            publisher,
            autoplay_pending: false,
        }
    }

    /// Receive every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.publisher.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        &self.snapshot.state
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.resource.is_some()
    }

    fn publish(&self) {
        self.publisher.send_replace(self.snapshot.clone());
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.snapshot.state != state {
            debug!(from = ?self.snapshot.state, to = ?state, "playback state changed");
            self.snapshot.state = state;
        }
        self.publish();
    }

    fn fail(&mut self, reason: String) {
        warn!(source = ?self.snapshot.source, %reason, "playback failed");
        self.autoplay_pending = false;
        self.set_state(PlaybackState::Error(reason));
    }

    fn clamp_position(&self, position: f64) -> f64 {
        match self.snapshot.duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        }
    }

    /// Pause and detach the current resource; bump the generation so any of
    /// its queued events are ignored.
    fn teardown(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            resource.pause();
            resource.detach();
            debug!(source = ?self.snapshot.source, "playback resource released");
        }
        self.generation = self.generation.wrapping_add(1);
        self.autoplay_pending = false;
    }

    /// Replace the current resource with one for `source`.
    ///
    /// The previous resource is fully torn down before the state becomes
    /// `Loading`. The state moves to `Ready` once metadata arrives.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Load` if the backend cannot open the source; the
    /// state is then `Error` and the caller may `retry`.
    pub fn load(&mut self, source: MediaUri, options: LoadOptions) -> Result<(), PlaybackError> {
        self.teardown();
        self.snapshot.source = Some(source.clone());
        self.snapshot.position = 0.0;
        self.snapshot.duration = None;
        self.set_state(PlaybackState::Loading);

        let sink = MediaEventSink::new(self.generation, self.events_tx.clone());
        match self.backend.open(&source, sink) {
            Ok(mut resource) => {
                resource.set_volume(self.snapshot.volume);
                resource.set_rate(self.snapshot.rate);
                self.resource = Some(resource);
                self.autoplay_pending = options.autoplay;
                info!(%source, autoplay = options.autoplay, "loading media");
                Ok(())
            }
            Err(err) => {
                self.fail(err.to_string());
                Err(err)
            }
        }
    }

    /// Reload the current source after an error.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NothingLoaded` if no source was ever loaded, or
    /// the load error.
    pub fn retry(&mut self) -> Result<(), PlaybackError> {
        let source = self
            .snapshot
            .source
            .clone()
            .ok_or(PlaybackError::NothingLoaded)?;
        self.load(source, LoadOptions::default())
    }

    /// Wait for the next event of the live resource and apply it.
    ///
    /// Stale events from replaced resources are skipped. Returns the state
    /// after the event (and any autoplay it triggered) was applied, or the
    /// current state right away when no resource is loaded.
    pub async fn next_event(&mut self) -> PlaybackState {
        while self.resource.is_some() {
            let Some((generation, event)) = self.events_rx.recv().await else {
                break;
            };
            if self.apply_event(generation, event) {
                break;
            }
        }
        self.run_pending_autoplay().await;
        self.snapshot.state.clone()
    }

    /// Apply every queued event without waiting. Returns how many applied.
    pub async fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((generation, event)) = self.events_rx.try_recv() {
            if self.apply_event(generation, event) {
                applied += 1;
            }
        }
        self.run_pending_autoplay().await;
        applied
    }

    fn apply_event(&mut self, generation: u64, event: MediaEvent) -> bool {
        if generation != self.generation || self.resource.is_none() {
            trace!(generation, current = self.generation, ?event, "dropping stale media event");
            return false;
        }

        match event {
            MediaEvent::MetadataLoaded { duration } => {
                // Non-finite durations (live streams) stay unknown.
                self.snapshot.duration = duration.is_finite().then(|| duration.max(0.0));
                if self.snapshot.state == PlaybackState::Loading {
                    self.set_state(PlaybackState::Ready);
                } else {
                    self.publish();
                }
            }
            MediaEvent::TimeUpdate { position } => {
                if position.is_finite() {
                    self.snapshot.position = self.clamp_position(position);
                    self.publish();
                }
            }
            MediaEvent::Playing => self.set_state(PlaybackState::Playing),
            MediaEvent::Paused => {
                if self.snapshot.state == PlaybackState::Playing {
                    self.set_state(PlaybackState::Paused);
                }
            }
            MediaEvent::Ended => {
                if let Some(duration) = self.snapshot.duration {
                    self.snapshot.position = duration;
                }
                self.set_state(PlaybackState::Ended);
            }
            MediaEvent::Failed(reason) => self.fail(reason),
        }
        true
    }

    async fn run_pending_autoplay(&mut self) {
        if !self.autoplay_pending || self.snapshot.state != PlaybackState::Ready {
            return;
        }
        self.autoplay_pending = false;
        tokio::time::sleep(AUTOPLAY_DELAY).await;

        for attempt in 1..=2 {
            match self.start_playback().await {
                Ok(()) => return,
                Err(PlayRejection::NotAllowed) if attempt == 1 => {
                    debug!("autoplay blocked; retrying once");
                    tokio::time::sleep(AUTOPLAY_RETRY_DELAY).await;
                }
                Err(PlayRejection::NotAllowed | PlayRejection::Aborted) => {
                    debug!("autoplay not permitted; waiting for user");
                    return;
                }
                Err(PlayRejection::Failed(reason)) => {
                    self.fail(reason);
                    return;
                }
            }
        }
    }

    async fn start_playback(&mut self) -> Result<(), PlayRejection> {
        let Some(resource) = self.resource.as_mut() else {
            return Err(PlayRejection::Aborted);
        };
        if self.snapshot.state == PlaybackState::Ended {
            resource.seek(0.0);
            self.snapshot.position = 0.0;
        }
        resource.play().await?;
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Toggle playback: pause when playing, otherwise start.
    ///
    /// A request interrupted by a concurrent teardown is not an error.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NothingLoaded`/`NotReady` when there is nothing
    /// playable, `NotAllowed` if the platform still refuses, or `Failed`.
    pub async fn play(&mut self) -> Result<(), PlaybackError> {
        let state = self.snapshot.state.clone();
        if state == PlaybackState::Playing {
            self.pause();
            return Ok(());
        }
        if self.resource.is_none() {
            return Err(PlaybackError::NothingLoaded);
        }
        if !state.is_playable() {
            return Err(PlaybackError::NotReady);
        }

        self.autoplay_pending = false;
        match self.start_playback().await {
            Ok(()) => Ok(()),
            Err(PlayRejection::Aborted) => {
                debug!("play request interrupted; ignoring");
                Ok(())
            }
            Err(PlayRejection::NotAllowed) => Err(PlaybackError::NotAllowed),
            Err(PlayRejection::Failed(reason)) => {
                self.fail(reason.clone());
                Err(PlaybackError::Failed(reason))
            }
        }
    }

    pub fn pause(&mut self) {
        if self.snapshot.state != PlaybackState::Playing {
            return;
        }
        if let Some(resource) = self.resource.as_mut() {
            resource.pause();
            let position = resource.position();
            self.snapshot.position = self.clamp_position(position);
        }
        self.set_state(PlaybackState::Paused);
    }

    /// Pause and rewind to the start.
    pub fn stop(&mut self) {
        let Some(resource) = self.resource.as_mut() else {
            return;
        };
        resource.pause();
        resource.seek(0.0);
        self.snapshot.position = 0.0;
        match self.snapshot.state {
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Ended => {
                self.set_state(PlaybackState::Paused);
            }
            _ => self.publish(),
        }
    }

    /// Move to `target` seconds, clamped into `[0, duration]`.
    ///
    /// No-op (returns `None`) until the duration is known.
    pub fn seek(&mut self, target: f64) -> Option<f64> {
        let duration = self.snapshot.duration?;
        if !target.is_finite() || !self.snapshot.state.is_playable() {
            return None;
        }
        let resource = self.resource.as_mut()?;
        let clamped = target.clamp(0.0, duration);
        resource.seek(clamped);
        self.snapshot.position = clamped;

        if self.snapshot.state == PlaybackState::Ended && clamped < duration {
            self.set_state(PlaybackState::Paused);
        } else {
            self.publish();
        }
        Some(clamped)
    }

    /// Set volume clamped into `[0, 1]`; returns the applied value.
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        if volume.is_finite() {
            self.snapshot.volume = volume.clamp(0.0, 1.0);
            if let Some(resource) = self.resource.as_mut() {
                resource.set_volume(self.snapshot.volume);
            }
            self.publish();
        }
        self.snapshot.volume
    }

    /// Set the playback rate clamped into `[MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE]`.
    pub fn set_playback_rate(&mut self, rate: f64) -> f64 {
        if rate.is_finite() {
            self.snapshot.rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
            if let Some(resource) = self.resource.as_mut() {
                resource.set_rate(self.snapshot.rate);
            }
            self.publish();
        }
        self.snapshot.rate
    }

    /// Stop playback and release the resource. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        let was_loaded = self.resource.is_some();
        self.teardown();
        while self.events_rx.try_recv().is_ok() {}
        self.snapshot.source = None;
        self.snapshot.position = 0.0;
        self.snapshot.duration = None;
        self.set_state(PlaybackState::Idle);
        if was_loaded {
            info!("player disposed");
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("generation", &self.generation)
            .field("loaded", &self.resource.is_some())
            .field("snapshot", &self.snapshot)
            .field("autoplay_pending", &self.autoplay_pending)
            .finish_non_exhaustive()
    }
}
