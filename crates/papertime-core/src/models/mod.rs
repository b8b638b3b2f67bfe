//! Data models for exam server entities.
//!
//! - `Paper`: exam paper metadata (title, duration, marks)
//! - `SubmissionRecord`: a stored score submission
//! - `UserProfile`: the signed-in account

pub mod paper;
pub mod user;

pub use paper::{Paper, SubmissionRecord};
pub use user::UserProfile;
