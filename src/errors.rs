use thiserror::Error;

use crate::client::BackendError;
use crate::domain::{ClassId, ExamId, InvalidOption};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no student record matches principal {0}")]
    IdentityNotFound(String),
    #[error("no exams are available for class {0}")]
    NoExamsForClass(ClassId),
    #[error("exam {exam_id} has no questions for class {class_id}")]
    ExamClassMismatch { exam_id: ExamId, class_id: ClassId },
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("{answered} of {total} questions answered; partial submission needs confirmation")]
    PartialConfirmationRequired { answered: usize, total: usize },
    #[error("submission rejected with status {status}: {body}")]
    SubmitRejected { status: u16, body: String },
    #[error("a submission for exam {0} is already in flight")]
    SubmitInFlight(ExamId),
    #[error("selection of exam {0} was superseded")]
    SelectionSuperseded(ExamId),
    #[error("exam {0} is still loading")]
    SelectionPending(ExamId),
    #[error("no exam is selected")]
    NoExamSelected,
    #[error("student identity has not been resolved")]
    IdentityUnresolved,
    #[error(transparent)]
    InvalidOption(#[from] InvalidOption),
}

impl EngineError {
    /// Only transport-level failures are worth retrying; everything else needs a different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }

    pub(crate) fn from_fetch(err: BackendError) -> Self {
        Self::NetworkFailure(err.to_string())
    }

    pub(crate) fn from_submit(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, body, .. } => Self::SubmitRejected { status, body },
            other => Self::NetworkFailure(other.to_string()),
        }
    }

    pub(crate) fn timed_out(what: &str) -> Self {
        Self::NetworkFailure(format!("{what} did not complete in time"))
    }
}
