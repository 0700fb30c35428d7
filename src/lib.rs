pub mod client;
pub mod core;
pub mod domain;
pub mod engine;
pub mod errors;
pub(crate) mod schemas;
pub mod services;

#[cfg(test)]
mod test_support;

pub use crate::client::{BackendError, ExamBackend, RestBackend};
pub use crate::domain::{AnswerOption, ExamId, QuestionId, Session};
pub use crate::engine::{ExamEngine, Ready, Stage, Submitted};
pub use crate::errors::EngineError;
pub use crate::schemas::submission::{SubmitReceipt, SubmitRequest, SubmittedAnswer};

use serde_json::json;

use crate::core::config::{ConfigError, Settings};
use crate::core::telemetry;

/// Resolves the configured principal, opens their newest exam and prints where it stands.
///
/// Read-only: answers are never written from here.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let principal =
        settings.session().principal.clone().ok_or(ConfigError::Missing("EXAM_PRINCIPAL"))?;
    let backend = RestBackend::from_settings(&settings)?;
    let engine = ExamEngine::from_settings(backend, Session::new(principal), &settings);

    tracing::info!(
        environment = %settings.runtime().environment.as_str(),
        base_url = %settings.api().base_url,
        principal = %engine.session().principal(),
        "Exam session engine starting"
    );

    let ready = engine.bootstrap().await?;
    for exam in engine.catalog() {
        tracing::info!(
            exam_id = %exam.exam_id,
            title = %exam.title,
            selected = exam.exam_id == ready.exam_id,
            "Available exam"
        );
    }

    let progress = engine.progress();
    let score = engine.score();
    let report = json!({
        "principal": engine.session().principal(),
        "student": engine.student(),
        "exams": engine.catalog(),
        "selected": {
            "examId": ready.exam_id,
            "title": ready.title,
            "locked": ready.locked,
        },
        "stage": engine.stage(),
        "progress": progress,
        "score": score,
        "ratio": score.ratio(),
        "questions": engine.question_results(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(rendered) = core::metrics::render() {
        println!("{rendered}");
    }

    Ok(())
}
