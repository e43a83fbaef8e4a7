mod controller;
mod progress;
mod state;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::SessionController;
pub use progress::{SessionProgress, format_clock};
pub use state::SubmitTrigger;
pub use view::{ResultSummaryItem, ResultSummaryService};
pub use workflow::{AssessmentService, LiveSession};
