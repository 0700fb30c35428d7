use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::backend::{BackendError, ExamBackend};
use crate::core::config::{ApiSettings, EndpointSettings, Settings, TimeoutSettings};
use crate::domain::{ExamId, QuestionRow, StudentRecord};
use crate::schemas::question::parse_question_feed;
use crate::schemas::student::parse_directory;
use crate::schemas::submission::{parse_receipt, SubmitReceipt, SubmitRequest};

/// `reqwest`-backed collaborator speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    token: Option<String>,
    students_url: String,
    questions_url: String,
    submit_url: String,
}

impl RestBackend {
    pub fn from_settings(settings: &Settings) -> Result<Self, BackendError> {
        Self::new(settings.api(), settings.endpoints(), settings.timeouts())
    }

    pub fn new(
        api: &ApiSettings,
        endpoints: &EndpointSettings,
        timeouts: &TimeoutSettings,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect_timeout())
            .timeout(timeouts.request_timeout())
            .build()
            .map_err(|err| BackendError::Transport {
                endpoint: api.base_url.to_string(),
                message: format!("Failed to build HTTP client: {err}"),
            })?;

        Ok(Self {
            client,
            token: api.token.clone(),
            students_url: api.endpoint(&endpoints.students_path),
            questions_url: api.endpoint(&endpoints.questions_path),
            submit_url: api.endpoint(&endpoints.submit_path),
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, BackendError> {
        let response = self
            .authorize(self.client.get(url).query(query))
            .send()
            .await
            .map_err(|err| transport_error(url, err))?;

        let (status, raw_body) = read_body(url, response).await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body: raw_body,
            });
        }

        serde_json::from_str::<Value>(&raw_body).map_err(|err| BackendError::Decode {
            endpoint: url.to_string(),
            message: format!("non-JSON body (status {status}): {err}"),
        })
    }
}

#[async_trait]
impl ExamBackend for RestBackend {
    async fn fetch_students(&self) -> Result<Vec<StudentRecord>, BackendError> {
        let body = self.get_json(&self.students_url, &[]).await?;
        parse_directory(body).map_err(|err| BackendError::Decode {
            endpoint: self.students_url.clone(),
            message: err.to_string(),
        })
    }

    async fn fetch_question_bank(
        &self,
        exam_id: Option<ExamId>,
    ) -> Result<Vec<QuestionRow>, BackendError> {
        let query: Vec<(&str, String)> =
            exam_id.map(|id| vec![("examId", id.to_string())]).unwrap_or_default();
        let body = self.get_json(&self.questions_url, &query).await?;
        parse_question_feed(body).map_err(|err| BackendError::Decode {
            endpoint: self.questions_url.clone(),
            message: err.to_string(),
        })
    }

    async fn submit_answers(
        &self,
        request: &SubmitRequest,
        request_id: &str,
    ) -> Result<SubmitReceipt, BackendError> {
        let url = self.submit_url.as_str();
        let response = self
            .authorize(self.client.patch(url))
            .header("X-Request-Id", request_id)
            .json(request)
            .send()
            .await
            .map_err(|err| transport_error(url, err))?;

        let (status, raw_body) = read_body(url, response).await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body: raw_body,
            });
        }

        Ok(parse_receipt(&raw_body))
    }
}

async fn read_body(
    url: &str,
    response: Response,
) -> Result<(reqwest::StatusCode, String), BackendError> {
    let status = response.status();
    let raw_body = response.text().await.map_err(|err| transport_error(url, err))?;
    Ok((status, raw_body))
}

fn transport_error(url: &str, err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        return BackendError::Timeout { endpoint: url.to_string() };
    }
    BackendError::Transport { endpoint: url.to_string(), message: err.to_string() }
}

