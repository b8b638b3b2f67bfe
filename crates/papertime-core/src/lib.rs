//! papertime core library.
//!
//! Everything a front-end needs to run a timed exam attempt against the
//! exam server:
//!
//! - `auth`: credential storage and single-flight token renewal
//! - `api`: the authenticated HTTP client and typed paper endpoints
//! - `document`: downloading exam documents with guaranteed release
//! - `exam`: the exam session state machine
//! - `config`, `models`, `utils`: configuration, wire models, formatting

pub mod api;
pub mod auth;
pub mod config;
pub mod document;
pub mod exam;
pub mod models;
pub mod utils;

pub use api::{ApiError, AuthenticatedClient, PaperApi, TokenPlacement};
pub use auth::{CredentialStore, SessionData, TokenManager};
pub use config::Config;
pub use document::{DocumentHandle, DocumentLoader};
pub use exam::{ExamController, ExamError, ExamSettings, ExamState};
pub use models::{Paper, SubmissionRecord, UserProfile};
