pub mod machine;
pub mod state;

pub use machine::Session;
pub use state::{CaptureStatus, ImageSummary, SessionEvent, SessionPhase, SessionState};
