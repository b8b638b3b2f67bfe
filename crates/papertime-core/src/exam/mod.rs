//! Timed exam attempts: countdown, document display, end, and submission.

pub mod controller;
mod countdown;
pub mod error;
pub mod session;

pub use controller::{DocumentStatus, ExamController, ExamSettings, DEFAULT_DURATION_SECS};
pub use error::ExamError;
pub use session::{ExamClock, ExamSession, ExamState, SubmissionResult, MAX_MARKS};
