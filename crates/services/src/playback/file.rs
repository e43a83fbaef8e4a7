//! Media backend for local audio files.
//!
//! Sources are resolved against a media root and read with symphonia to
//! learn their length. Playback position is driven by a clock task; no audio
//! device is opened.

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use listening_core::model::MediaUri;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::backend::{MediaBackend, MediaEvent, MediaEventSink, MediaResource, PlayRejection};
use crate::error::PlaybackError;

/// Interval between `TimeUpdate` events while playing.
pub const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Backend resolving relative and root-anchored paths under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }
}

/// Length in seconds of the first decodable audio track of `path`.
///
/// Returns `f64::INFINITY` when the container does not declare a frame count.
#[allow(clippy::cast_precision_loss)]
fn read_duration(path: &Path) -> Result<f64, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let opened = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("unrecognized format: {e}"))?;

    let track = opened
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no audio track found".to_string())?;
    let params = &track.codec_params;

    symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|e| format!("unsupported codec: {e}"))?;

    let Some(frames) = params.n_frames else {
        return Ok(f64::INFINITY);
    };
    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(frames);
        return Ok(time.seconds as f64 + time.frac);
    }
    match params.sample_rate {
        Some(rate) if rate > 0 => Ok(frames as f64 / f64::from(rate)),
        _ => Ok(f64::INFINITY),
    }
}

impl MediaBackend for FileBackend {
    fn open(
        &self,
        source: &MediaUri,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaResource>, PlaybackError> {
        let load_error = |reason: &str| PlaybackError::Load {
            uri: source.to_string(),
            reason: reason.to_string(),
        };
        let path = source
            .as_path()
            .ok_or_else(|| load_error("only local files can be played"))?;
        let path = self
            .resolve(path)
            .ok_or_else(|| load_error("path leaves the media root"))?;
        if !path.is_file() {
            return Err(load_error("file not found"));
        }

        let transport = Arc::new(Mutex::new(Transport::default()));
        let read_metadata = {
            let transport = Arc::clone(&transport);
            let events = events.clone();
            move || match read_duration(&path) {
                Ok(duration) => {
                    debug!(path = %path.display(), duration, "media metadata read");
                    lock(&transport).duration = duration.is_finite().then_some(duration);
                    events.emit(MediaEvent::MetadataLoaded { duration });
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "media cannot be decoded");
                    events.emit(MediaEvent::Failed(reason));
                }
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(read_metadata);
            }
            Err(_) => read_metadata(),
        }

        Ok(Box::new(FileResource {
            transport,
            events,
            detached: false,
        }))
    }
}

#[derive(Debug)]
struct Transport {
    duration: Option<f64>,
    position: f64,
    rate: f64,
    clock: Option<JoinHandle<()>>,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            duration: None,
            position: 0.0,
            rate: 1.0,
            clock: None,
        }
    }
}

fn lock(transport: &Mutex<Transport>) -> MutexGuard<'_, Transport> {
    transport.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

async fn run_clock(transport: Arc<Mutex<Transport>>, events: MediaEventSink) {
    let mut ticker =
        tokio::time::interval_at(Instant::now() + TIME_UPDATE_INTERVAL, TIME_UPDATE_INTERVAL);
    loop {
        ticker.tick().await;
        let (position, ended) = {
            let mut t = lock(&transport);
            t.position += TIME_UPDATE_INTERVAL.as_secs_f64() * t.rate;
            let ended = match t.duration {
                Some(duration) if t.position >= duration => {
                    t.position = duration;
                    t.clock = None;
                    true
                }
                _ => false,
            };
            (t.position, ended)
        };
        if !events.emit(MediaEvent::TimeUpdate { position }) {
            return;
        }
        if ended {
            events.emit(MediaEvent::Ended);
            return;
        }
    }
}

struct FileResource {
    transport: Arc<Mutex<Transport>>,
    events: MediaEventSink,
    detached: bool,
}

impl FileResource {
    fn stop_clock(&self) {
        if let Some(clock) = lock(&self.transport).clock.take() {
            clock.abort();
        }
    }
}

#[async_trait]
impl MediaResource for FileResource {
    async fn play(&mut self) -> Result<(), PlayRejection> {
        if self.detached {
            return Err(PlayRejection::Aborted);
        }
        let mut transport = lock(&self.transport);
        if transport.clock.is_none() {
            let clock = run_clock(Arc::clone(&self.transport), self.events.clone());
            transport.clock = Some(tokio::spawn(clock));
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.stop_clock();
    }

    fn seek(&mut self, position: f64) {
        let mut transport = lock(&self.transport);
        transport.position = match transport.duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        };
    }

    fn position(&self) -> f64 {
        lock(&self.transport).position
    }

    fn set_volume(&mut self, volume: f64) {
        trace!(volume, "volume set");
    }

    fn set_rate(&mut self, rate: f64) {
        lock(&self.transport).rate = rate;
    }

    fn detach(&mut self) {
        if std::mem::replace(&mut self.detached, true) {
            return;
        }
        self.stop_clock();
    }
}

impl Drop for FileResource {
    fn drop(&mut self) {
        self.detach();
    }
}
