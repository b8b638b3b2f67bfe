use thiserror::Error;

use crate::api::ApiError;
use crate::document::DocumentError;

use super::session::ExamState;

#[derive(Error, Debug)]
pub enum ExamError {
    #[error("Enter your marks before submitting")]
    MissingMarks,

    #[error("Marks must be between 0 and 100, got {0}")]
    OutOfRange(i64),

    #[error("Cannot {action} while the exam is {state}")]
    InvalidTransition {
        action: &'static str,
        state: ExamState,
    },

    #[error("Could not load the paper: {0}")]
    DocumentLoadFailed(#[from] DocumentError),

    #[error("Submission failed: {0}")]
    SubmissionNetworkFailure(#[source] ApiError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ExamError {
    /// The signed-in session is gone and the user has to log in again.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ExamError::DocumentLoadFailed(e) => e.is_auth_failure(),
            ExamError::SubmissionNetworkFailure(e) | ExamError::Api(e) => e.is_auth_failure(),
            _ => false,
        }
    }

    /// Validation errors that leave the exam state untouched.
    pub fn is_validation(&self) -> bool {
        matches!(self, ExamError::MissingMarks | ExamError::OutOfRange(_))
    }
}
