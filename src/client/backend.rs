use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ExamId, QuestionRow, StudentRecord};
use crate::schemas::submission::{SubmitReceipt, SubmitRequest};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("{endpoint} responded with status {status}: {body}")]
    Status { endpoint: String, status: u16, body: String },
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// The REST collaborator the engine reads from and saves to.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// Full student directory.
    async fn fetch_students(&self) -> Result<Vec<StudentRecord>, BackendError>;

    /// Question-bank rows, optionally scoped to one exam. Rows cover every student.
    async fn fetch_question_bank(
        &self,
        exam_id: Option<ExamId>,
    ) -> Result<Vec<QuestionRow>, BackendError>;

    async fn submit_answers(
        &self,
        request: &SubmitRequest,
        request_id: &str,
    ) -> Result<SubmitReceipt, BackendError>;
}

#[async_trait]
impl<T> ExamBackend for Arc<T>
where
    T: ExamBackend + ?Sized,
{
    async fn fetch_students(&self) -> Result<Vec<StudentRecord>, BackendError> {
        (**self).fetch_students().await
    }

    async fn fetch_question_bank(
        &self,
        exam_id: Option<ExamId>,
    ) -> Result<Vec<QuestionRow>, BackendError> {
        (**self).fetch_question_bank(exam_id).await
    }

    async fn submit_answers(
        &self,
        request: &SubmitRequest,
        request_id: &str,
    ) -> Result<SubmitReceipt, BackendError> {
        (**self).submit_answers(request, request_id).await
    }
}
