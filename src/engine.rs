use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::client::ExamBackend;
use crate::core::config::Settings;
use crate::core::metrics;
use crate::core::time::{format_offset, now_utc};
use crate::domain::{
    AnswerOption, ExamDescriptor, ExamId, QuestionId, QuestionRow, Session, StudentRecord,
};
use crate::errors::EngineError;
use crate::services::answers::{AnswerMap, AnswerSheet, AnswerWrite, LockedSet};
use crate::services::catalog::{discover_exams, ExamSummary};
use crate::services::dedup::{canonicalize, validate_exam_rows, CanonicalQuestion};
use crate::services::identity::resolve_identity;
use crate::services::reconcile::reconcile;
use crate::services::scoring::{grade_questions, score, Progress, QuestionResult, Score};
use crate::services::submission::build_submission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ResolvingIdentity,
    DiscoveringExams,
    LoadingExam,
    Ready,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub exam_id: ExamId,
    pub title: String,
    pub total: usize,
    pub answered: usize,
    pub locked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub exam_id: ExamId,
    pub answered: usize,
    pub total: usize,
    pub payload_digest: String,
    pub request_id: String,
    pub submitted_at: OffsetDateTime,
    /// False when the post-submit reload failed or was superseded; the save itself succeeded.
    pub reconciled: bool,
}

struct LoadedExam {
    descriptor: ExamDescriptor,
    questions: Vec<CanonicalQuestion>,
    rows: Vec<QuestionRow>,
    sheet: AnswerSheet,
    reveal_answers: bool,
}

impl LoadedExam {
    fn ready(&self) -> Ready {
        Ready {
            exam_id: self.descriptor.id,
            title: self.descriptor.title.clone(),
            total: self.sheet.total(),
            answered: self.sheet.answered(),
            locked: self.sheet.locked().len(),
        }
    }
}

struct EngineState {
    stage: Stage,
    student: Option<StudentRecord>,
    catalog: Vec<ExamSummary>,
    selection: u64,
    /// Selection token and target of the load currently in flight.
    loading: Option<(u64, ExamId)>,
    exam: Option<LoadedExam>,
    submitting: Option<ExamId>,
}

impl EngineState {
    /// Stage to fall back to once no operation is running.
    fn settle(&mut self) {
        self.stage = match &self.exam {
            Some(exam) if exam.reveal_answers => Stage::Submitted,
            Some(_) => Stage::Ready,
            None => Stage::Idle,
        };
    }

    /// True while `token` is the latest selection and `exam_id` is still the loaded exam.
    fn is_current(&self, token: u64, exam_id: ExamId) -> bool {
        self.selection == token
            && self.exam.as_ref().map(|exam| exam.descriptor.id) == Some(exam_id)
    }

    fn ensure_not_loading(&self) -> Result<(), EngineError> {
        match self.loading {
            Some((_, pending)) => Err(EngineError::SelectionPending(pending)),
            None => Ok(()),
        }
    }
}

/// Exam session pipeline for one principal.
///
/// Every async operation takes `&self`, so a newer selection may start while an older one is
/// still fetching; results are applied only if their selection token is still current.
pub struct ExamEngine<B> {
    backend: B,
    session: Session,
    fetch_timeout: Duration,
    state: Mutex<EngineState>,
}

/// Clears the in-flight submit marker however the submit future ends, including cancellation.
struct SubmitGuard<'a> {
    state: &'a Mutex<EngineState>,
}

/// Clears the pending-load marker of one selection, including when its future is dropped.
struct SelectionGuard<'a> {
    state: &'a Mutex<EngineState>,
    token: u64,
}

impl Drop for SelectionGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.loading.map(|(token, _)| token) == Some(self.token) {
            state.loading = None;
            if state.stage == Stage::LoadingExam {
                state.settle();
            }
        }
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.submitting = None;
        if state.stage == Stage::Submitting {
            state.settle();
        }
    }
}

impl<B: ExamBackend> ExamEngine<B> {
    pub fn new(backend: B, session: Session, fetch_timeout: Duration) -> Self {
        Self {
            backend,
            session,
            fetch_timeout,
            state: Mutex::new(EngineState {
                stage: Stage::Idle,
                student: None,
                catalog: Vec::new(),
                selection: 0,
                loading: None,
                exam: None,
                submitting: None,
            }),
        }
    }

    pub fn from_settings(backend: B, session: Session, settings: &Settings) -> Self {
        Self::new(backend, session, settings.timeouts().fetch_timeout())
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        match tokio::time::timeout(self.fetch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    principal = %self.session.principal(),
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "{what} timed out"
                );
                Err(EngineError::timed_out(what))
            }
        }
    }

    /// Resolves the principal, discovers the class's exams and opens the preferred one.
    pub async fn bootstrap(&self) -> Result<Ready, EngineError> {
        let student = self.ensure_student().await?;

        self.state().stage = Stage::DiscoveringExams;
        let bulk = self
            .bounded("exam discovery", async {
                self.backend.fetch_question_bank(None).await.map_err(EngineError::from_fetch)
            })
            .await;

        let catalog = match bulk.and_then(|rows| discover_exams(student.class_id, &rows)) {
            Ok(catalog) => catalog,
            Err(err) => {
                let mut state = self.state();
                if matches!(err, EngineError::NoExamsForClass(_)) {
                    state.catalog.clear();
                }
                state.settle();
                tracing::warn!(class_id = %student.class_id, error = %err, "Exam discovery failed");
                return Err(err);
            }
        };

        let Some(preferred) = catalog.preferred() else {
            self.state().settle();
            return Err(EngineError::NoExamsForClass(student.class_id));
        };
        tracing::info!(
            class_id = %student.class_id,
            exams = catalog.exams().len(),
            preferred = %preferred,
            "Discovered exams"
        );
        self.state().catalog = catalog.into_exams();

        self.select_exam(preferred).await
    }

    async fn ensure_student(&self) -> Result<StudentRecord, EngineError> {
        {
            let mut state = self.state();
            if let Some(student) = &state.student {
                return Ok(student.clone());
            }
            state.stage = Stage::ResolvingIdentity;
        }

        let resolved = self
            .bounded("identity resolution", async {
                let directory =
                    self.backend.fetch_students().await.map_err(EngineError::from_fetch)?;
                resolve_identity(&self.session, &directory)
            })
            .await;

        let mut state = self.state();
        match resolved {
            Ok(student) => {
                tracing::info!(
                    principal = %self.session.principal(),
                    student_id = %student.id,
                    class_id = %student.class_id,
                    "Resolved student identity"
                );
                state.student = Some(student.clone());
                Ok(student)
            }
            Err(err) => {
                state.settle();
                tracing::error!(
                    principal = %self.session.principal(),
                    error = %err,
                    "Identity resolution failed"
                );
                Err(err)
            }
        }
    }

    pub fn catalog(&self) -> Vec<ExamSummary> {
        self.state().catalog.clone()
    }

    /// Loads `exam_id` from a fresh scoped fetch and replaces the exam state wholesale.
    ///
    /// On failure the previously loaded exam, if any, stays usable.
    pub async fn select_exam(&self, exam_id: ExamId) -> Result<Ready, EngineError> {
        let (student, token) = {
            let mut state = self.state();
            let Some(student) = state.student.clone() else {
                return Err(EngineError::IdentityUnresolved);
            };
            state.selection += 1;
            state.loading = Some((state.selection, exam_id));
            state.stage = Stage::LoadingExam;
            (student, state.selection)
        };
        let _guard = SelectionGuard { state: &self.state, token };

        tracing::debug!(exam_id = %exam_id, token, "Loading exam");
        let loaded = self.load_exam(exam_id, &student).await;

        let mut state = self.state();
        if state.selection != token {
            tracing::debug!(exam_id = %exam_id, token, "Discarding superseded exam load");
            metrics::selection_finished("superseded");
            return Err(EngineError::SelectionSuperseded(exam_id));
        }

        state.loading = None;
        match loaded {
            Ok(exam) => {
                let ready = exam.ready();
                state.exam = Some(exam);
                state.settle();
                metrics::selection_finished("ready");
                tracing::info!(
                    exam_id = %exam_id,
                    total = ready.total,
                    answered = ready.answered,
                    locked = ready.locked,
                    "Exam ready"
                );
                Ok(ready)
            }
            Err(err) => {
                state.settle();
                metrics::selection_finished(match err {
                    EngineError::ExamClassMismatch { .. } => "class_mismatch",
                    _ => "failed",
                });
                tracing::warn!(
                    exam_id = %exam_id,
                    class_id = %student.class_id,
                    error = %err,
                    "Exam load failed"
                );
                Err(err)
            }
        }
    }

    /// Reloads the selected exam from the server, keeping the reveal flag.
    ///
    /// Refused while a selection is loading; a result that lands after a newer selection or a
    /// deselect is discarded.
    pub async fn refresh(&self) -> Result<Ready, EngineError> {
        let (student, exam_id, reveal, token) = {
            let state = self.state();
            let Some(student) = state.student.clone() else {
                return Err(EngineError::IdentityUnresolved);
            };
            state.ensure_not_loading()?;
            let Some(exam) = &state.exam else {
                return Err(EngineError::NoExamSelected);
            };
            (student, exam.descriptor.id, exam.reveal_answers, state.selection)
        };

        let loaded = self.load_exam(exam_id, &student).await;

        let mut state = self.state();
        if !state.is_current(token, exam_id) {
            tracing::debug!(exam_id = %exam_id, token, "Discarding superseded refresh");
            return Err(EngineError::SelectionSuperseded(exam_id));
        }
        match loaded {
            Ok(mut exam) => {
                exam.reveal_answers = reveal;
                let ready = exam.ready();
                state.exam = Some(exam);
                if state.submitting.is_none() {
                    state.settle();
                }
                Ok(ready)
            }
            Err(err) => {
                tracing::warn!(
                    exam_id = %exam_id,
                    error = %err,
                    "Exam refresh failed; keeping local state"
                );
                Err(err)
            }
        }
    }

    /// Drops the selected exam. In-flight loads for it are discarded when they land.
    pub fn deselect(&self) {
        let mut state = self.state();
        state.selection += 1;
        state.loading = None;
        state.exam = None;
        if state.submitting.is_none() {
            state.settle();
        }
    }

    async fn load_exam(
        &self,
        exam_id: ExamId,
        student: &StudentRecord,
    ) -> Result<LoadedExam, EngineError> {
        self.bounded("exam load", async {
            let rows = self
                .backend
                .fetch_question_bank(Some(exam_id))
                .await
                .map_err(EngineError::from_fetch)?;
            let rows = validate_exam_rows(exam_id, student.class_id, rows)?;
            let questions = canonicalize(&rows);
            let sheet = reconcile(&questions, &rows, &self.session);
            let Some(descriptor) = rows.first().map(|row| row.exam.clone()) else {
                return Err(EngineError::ExamClassMismatch { exam_id, class_id: student.class_id });
            };

            Ok(LoadedExam { descriptor, questions, rows, sheet, reveal_answers: false })
        })
        .await
    }

    /// Writes an answer unless the question is locked or unknown; those calls are no-ops.
    pub fn set_answer(&self, question_id: QuestionId, option: AnswerOption) -> AnswerWrite {
        let mut state = self.state();
        let Some(exam) = state.exam.as_mut() else {
            return AnswerWrite::UnknownQuestion;
        };
        let outcome = exam.sheet.set_answer(question_id, option);
        if outcome == AnswerWrite::Locked {
            tracing::debug!(question_id = %question_id, "Ignored write to locked question");
        }
        outcome
    }

    /// `set_answer` for raw UI input.
    pub fn choose(&self, question_id: QuestionId, option: u8) -> Result<AnswerWrite, EngineError> {
        let option = AnswerOption::new(option)?;
        Ok(self.set_answer(question_id, option))
    }

    /// Saves the answers, stopping at the partial-submission gate when questions are unanswered.
    pub async fn submit(&self) -> Result<Submitted, EngineError> {
        self.submit_with(false).await
    }

    /// Saves the answers after the caller confirmed a partial submission.
    pub async fn submit_confirmed(&self) -> Result<Submitted, EngineError> {
        self.submit_with(true).await
    }

    async fn submit_with(&self, confirmed: bool) -> Result<Submitted, EngineError> {
        let (student, plan, token) = {
            let mut state = self.state();
            let Some(student) = state.student.clone() else {
                return Err(EngineError::IdentityUnresolved);
            };
            state.ensure_not_loading()?;
            let Some(exam) = &state.exam else {
                return Err(EngineError::NoExamSelected);
            };
            if let Some(in_flight) = state.submitting {
                return Err(EngineError::SubmitInFlight(in_flight));
            }

            let plan = build_submission(
                exam.descriptor.id,
                &student.email,
                &exam.questions,
                exam.sheet.answers(),
            );
            plan.check_gate(confirmed)?;

            state.submitting = Some(plan.request().exam_id);
            state.stage = Stage::Submitting;
            (student, plan, state.selection)
        };
        let _guard = SubmitGuard { state: &self.state };

        let exam_id = plan.request().exam_id;
        let request_id = Uuid::new_v4().to_string();
        let payload_digest = plan.digest();
        let started = Instant::now();

        let sent = self
            .bounded("submission", async {
                self.backend
                    .submit_answers(plan.request(), &request_id)
                    .await
                    .map_err(EngineError::from_submit)
            })
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        let receipt = match sent {
            Ok(receipt) => receipt,
            Err(err) => {
                metrics::submission_finished(
                    if matches!(err, EngineError::SubmitRejected { .. }) {
                        "rejected"
                    } else {
                        "failed"
                    },
                    elapsed,
                );
                tracing::warn!(
                    exam_id = %exam_id,
                    request_id = %request_id,
                    payload_digest = %payload_digest,
                    error = %err,
                    "Submission failed; local answers kept"
                );
                return Err(err);
            }
        };

        let submitted_at = now_utc();
        metrics::submission_finished("accepted", elapsed);
        tracing::info!(
            exam_id = %exam_id,
            request_id = %request_id,
            payload_digest = %payload_digest,
            answered = plan.answered(),
            total = plan.total(),
            echoed_rows = receipt.echoed_rows,
            submitted_at = %format_offset(submitted_at),
            "Submission accepted"
        );

        let reloaded = self.load_exam(exam_id, &student).await;

        let reconciled = {
            let mut state = self.state();
            if !state.is_current(token, exam_id) {
                tracing::debug!(
                    exam_id = %exam_id,
                    "Exam changed during submission; skipping reload"
                );
                false
            } else {
                let reconciled = match reloaded {
                    Ok(mut exam) => {
                        exam.reveal_answers = true;
                        state.exam = Some(exam);
                        true
                    }
                    Err(err) => {
                        tracing::warn!(
                            exam_id = %exam_id,
                            error = %err,
                            "Post-submit reload failed; keeping local state"
                        );
                        if let Some(exam) = state.exam.as_mut() {
                            exam.reveal_answers = true;
                        }
                        false
                    }
                };
                state.stage = Stage::Submitted;
                reconciled
            }
        };

        Ok(Submitted {
            exam_id,
            answered: plan.answered(),
            total: plan.total(),
            payload_digest,
            request_id,
            submitted_at,
            reconciled,
        })
    }

    pub fn progress(&self) -> Progress {
        match &self.state().exam {
            Some(exam) => Progress { answered: exam.sheet.answered(), total: exam.sheet.total() },
            None => Progress::default(),
        }
    }

    pub fn score(&self) -> Score {
        score(&self.question_results())
    }

    /// Per-question detail with the three-state outcome.
    pub fn question_results(&self) -> Vec<QuestionResult> {
        match &self.state().exam {
            Some(exam) => grade_questions(
                &exam.questions,
                &exam.rows,
                &self.session,
                &exam.sheet,
                exam.reveal_answers,
            ),
            None => Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.state().stage
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn student(&self) -> Option<StudentRecord> {
        self.state().student.clone()
    }

    pub fn selected_exam(&self) -> Option<ExamDescriptor> {
        self.state().exam.as_ref().map(|exam| exam.descriptor.clone())
    }

    pub fn questions(&self) -> Vec<CanonicalQuestion> {
        self.state().exam.as_ref().map(|exam| exam.questions.clone()).unwrap_or_default()
    }

    pub fn answers(&self) -> AnswerMap {
        self.state().exam.as_ref().map(|exam| exam.sheet.answers().clone()).unwrap_or_default()
    }

    pub fn locked(&self) -> LockedSet {
        self.state().exam.as_ref().map(|exam| exam.sheet.locked().clone()).unwrap_or_default()
    }

    pub fn is_locked(&self, question_id: QuestionId) -> bool {
        self.state().exam.as_ref().is_some_and(|exam| exam.sheet.is_locked(question_id))
    }

    pub fn reveal_answers(&self) -> bool {
        self.state().exam.as_ref().is_some_and(|exam| exam.reveal_answers)
    }
}
