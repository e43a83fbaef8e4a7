#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod navigation;
pub mod playback;
pub mod review;
pub mod sessions;
pub mod timer;

pub use listening_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, PlaybackError, ReviewError, SessionError};
pub use navigation::Cursor;
pub use playback::{
    FileBackend, LoadOptions, PlaybackSnapshot, PlaybackState, Player, SimulatedBackend,
};
pub use review::{ReviewItem, ReviewService, ReviewSession};
pub use sessions::{
    AssessmentService, LiveSession, ResultSummaryItem, ResultSummaryService, SessionController,
    SessionProgress, SubmitTrigger,
};
pub use timer::{CountdownTimer, TimerState};
