//! In-process media backend without real audio output.
//!
//! Used by tests. Every opened source reports its metadata immediately;
//! failures and autoplay blocking are configured per backend.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use listening_core::model::MediaUri;
use tracing::debug;

use super::backend::{MediaBackend, MediaEvent, MediaEventSink, MediaResource, PlayRejection};
use crate::error::PlaybackError;

#[derive(Debug, Default)]
struct Config {
    default_duration: f64,
    failing: HashSet<String>,
    refused: HashSet<String>,
    autoplay_blocked: bool,
    gesture_granted: bool,
    rejections: VecDeque<PlayRejection>,
    play_attempts: usize,
    opened: usize,
    live: usize,
    last_volume: Option<f64>,
    last_rate: Option<f64>,
    current: Option<MediaEventSink>,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    config: Arc<Mutex<Config>>,
}

fn lock(config: &Mutex<Config>) -> MutexGuard<'_, Config> {
    config.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl SimulatedBackend {
    /// Backend whose media all last `default_duration` seconds.
    #[must_use]
    pub fn new(default_duration: f64) -> Self {
        let backend = Self::default();
        lock(&backend.config).default_duration = default_duration;
        backend
    }

    /// Opening `source` succeeds but the media then fails to decode.
    pub fn fail_source(&self, source: impl Into<String>) {
        lock(&self.config).failing.insert(source.into());
    }

    pub fn heal_source(&self, source: &str) {
        let mut config = lock(&self.config);
        config.failing.remove(source);
        config.refused.remove(source);
    }

    /// Opening `source` is refused outright.
    pub fn refuse_source(&self, source: impl Into<String>) {
        lock(&self.config).refused.insert(source.into());
    }

    /// Refuse every play request until [`grant_user_gesture`](Self::grant_user_gesture).
    pub fn block_autoplay(&self) {
        let mut config = lock(&self.config);
        config.autoplay_blocked = true;
        config.gesture_granted = false;
    }

    pub fn grant_user_gesture(&self) {
        lock(&self.config).gesture_granted = true;
    }

    /// Queue a one-shot rejection for the next play request.
    pub fn reject_next_play(&self, rejection: PlayRejection) {
        lock(&self.config).rejections.push_back(rejection);
    }

    /// Report the live resource as having played to the end.
    pub fn finish_playback(&self) {
        let config = lock(&self.config);
        if let Some(sink) = &config.current {
            sink.emit(MediaEvent::Ended);
        }
    }

    #[must_use]
    pub fn opened(&self) -> usize {
        lock(&self.config).opened
    }

    #[must_use]
    pub fn live_resources(&self) -> usize {
        lock(&self.config).live
    }

    #[must_use]
    pub fn play_attempts(&self) -> usize {
        lock(&self.config).play_attempts
    }

    #[must_use]
    pub fn last_volume(&self) -> Option<f64> {
        lock(&self.config).last_volume
    }

    #[must_use]
    pub fn last_rate(&self) -> Option<f64> {
        lock(&self.config).last_rate
    }
}

impl MediaBackend for SimulatedBackend {
    fn open(
        &self,
        source: &MediaUri,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaResource>, PlaybackError> {
        let key = source.to_string();
        let mut config = lock(&self.config);
        if config.refused.contains(&key) {
            return Err(PlaybackError::Load {
                uri: key,
                reason: "source unreachable".into(),
            });
        }

        config.opened += 1;
        config.live += 1;
        config.current = Some(events.clone());

        let duration = config.default_duration;
        if config.failing.contains(&key) {
            events.emit(MediaEvent::Failed(format!("cannot decode {key}")));
        } else {
            events.emit(MediaEvent::MetadataLoaded { duration });
        }
        debug!(source = %key, generation = events.generation(), "simulated media opened");

        Ok(Box::new(SimulatedResource {
            config: Arc::clone(&self.config),
            events,
            duration,
            position: 0.0,
            detached: false,
        }))
    }
}

struct SimulatedResource {
    config: Arc<Mutex<Config>>,
    events: MediaEventSink,
    duration: f64,
    position: f64,
    detached: bool,
}

#[async_trait]
impl MediaResource for SimulatedResource {
    async fn play(&mut self) -> Result<(), PlayRejection> {
        if self.detached {
            return Err(PlayRejection::Aborted);
        }
        let mut config = lock(&self.config);
        config.play_attempts += 1;
        if let Some(rejection) = config.rejections.pop_front() {
            return Err(rejection);
        }
        if config.autoplay_blocked && !config.gesture_granted {
            return Err(PlayRejection::NotAllowed);
        }
        Ok(())
    }

    fn pause(&mut self) {}

    fn seek(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.duration.max(0.0));
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn set_volume(&mut self, volume: f64) {
        lock(&self.config).last_volume = Some(volume);
    }

    fn set_rate(&mut self, rate: f64) {
        lock(&self.config).last_rate = Some(rate);
    }

    fn detach(&mut self) {
        if std::mem::replace(&mut self.detached, true) {
            return;
        }
        let mut config = lock(&self.config);
        config.live = config.live.saturating_sub(1);
        let is_current = config
            .current
            .as_ref()
            .is_some_and(|sink| sink.generation() == self.events.generation());
        if is_current {
            config.current = None;
        }
    }
}

impl Drop for SimulatedResource {
    fn drop(&mut self) {
        self.detach();
    }
}
