use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};

use crate::client::{BackendError, ExamBackend};
use crate::domain::{
    same_email, AnswerOption, ClassId, ExamDescriptor, ExamId, QuestionId, QuestionRow, StudentId,
    StudentRecord,
};
use crate::schemas::submission::{SubmitReceipt, SubmitRequest};
use crate::services::dedup::CanonicalQuestion;

const FAKE_ENDPOINT: &str = "fake://collaborator";

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn opt(value: u8) -> AnswerOption {
    AnswerOption::new(value).expect("valid option")
}

pub(crate) fn student(id: i64, email: &str, class_id: i64) -> StudentRecord {
    StudentRecord { id: StudentId(id), email: email.to_string(), class_id: ClassId(class_id) }
}

pub(crate) fn row(id: i64, exam_id: i64, class_id: i64, text: &str, email: &str) -> QuestionRow {
    QuestionRow {
        id: QuestionId(id),
        question: text.to_string(),
        options: ["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()],
        correct_option: None,
        student_answer: None,
        result: None,
        exam: ExamDescriptor {
            id: ExamId(exam_id),
            title: format!("Exam {exam_id}"),
            class_id: ClassId(class_id),
        },
        student_email: email.to_string(),
    }
}

pub(crate) fn canonical(id: i64, text: &str) -> CanonicalQuestion {
    CanonicalQuestion {
        id: QuestionId(id),
        text: text.to_string(),
        options: ["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()],
        correct_option: None,
    }
}

pub(crate) trait RowBuilder {
    fn titled(self, title: &str) -> Self;
    fn correct(self, option: u8) -> Self;
    fn answered(self, option: u8) -> Self;
    fn graded(self, result: bool) -> Self;
}

impl RowBuilder for QuestionRow {
    fn titled(mut self, title: &str) -> Self {
        self.exam.title = title.to_string();
        self
    }

    fn correct(mut self, option: u8) -> Self {
        self.correct_option = Some(opt(option));
        self
    }

    fn answered(mut self, option: u8) -> Self {
        self.student_answer = Some(opt(option));
        self
    }

    fn graded(mut self, result: bool) -> Self {
        self.result = Some(result);
        self
    }
}

/// Parks a backend call until the test releases it.
#[derive(Default)]
pub(crate) struct Gate {
    pub(crate) started: Notify,
    pub(crate) release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.started.notify_one();
        self.release.notified().await;
    }
}

#[derive(Default)]
struct FakeState {
    students: Vec<StudentRecord>,
    rows: Vec<QuestionRow>,
    next_row_id: i64,
    fail_fetches: bool,
    fail_submits: bool,
    reject_submits: Option<(u16, String)>,
    exam_gates: HashMap<ExamId, Arc<Gate>>,
    submit_gate: Option<Arc<Gate>>,
    question_fetches: Vec<Option<ExamId>>,
    submissions: Vec<SubmitRequest>,
    request_ids: Vec<String>,
}

/// In-memory collaborator that grades and persists submissions the way the real server does:
/// first recorded answer per (student, question) wins, `result` only when a correct option exists.
#[derive(Default)]
pub(crate) struct FakeBackend {
    state: StdMutex<FakeState>,
}

impl FakeBackend {
    pub(crate) fn new(students: Vec<StudentRecord>, rows: Vec<QuestionRow>) -> Self {
        let next_row_id = rows.iter().map(|row| row.id.0).max().unwrap_or(0) + 1000;
        Self {
            state: StdMutex::new(FakeState {
                students,
                rows,
                next_row_id,
                ..FakeState::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_fail_fetches(&self, fail: bool) {
        self.state().fail_fetches = fail;
    }

    pub(crate) fn set_fail_submits(&self, fail: bool) {
        self.state().fail_submits = fail;
    }

    pub(crate) fn reject_submits(&self, status: u16, body: &str) {
        self.state().reject_submits = Some((status, body.to_string()));
    }

    pub(crate) fn push_rows(&self, rows: Vec<QuestionRow>) {
        self.state().rows.extend(rows);
    }

    /// The next scoped fetch for `exam_id` waits on the returned gate.
    pub(crate) fn hold_exam(&self, exam_id: ExamId) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.state().exam_gates.insert(exam_id, gate.clone());
        gate
    }

    pub(crate) fn hold_submit(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.state().submit_gate = Some(gate.clone());
        gate
    }

    pub(crate) fn question_fetches(&self) -> Vec<Option<ExamId>> {
        self.state().question_fetches.clone()
    }

    pub(crate) fn submissions(&self) -> Vec<SubmitRequest> {
        self.state().submissions.clone()
    }

    pub(crate) fn request_ids(&self) -> Vec<String> {
        self.state().request_ids.clone()
    }

    fn apply_submission(state: &mut FakeState, request: &SubmitRequest) -> usize {
        let mut echoed = 0;
        for answer in &request.answers {
            let Some(option) = answer.student_answer else {
                continue;
            };
            let Some(template) = state.rows.iter().find(|row| row.id == answer.id).cloned() else {
                continue;
            };
            let result = template.correct_option.map(|correct| correct == option);
            let existing = state.rows.iter_mut().find(|row| {
                row.exam.id == request.exam_id
                    && same_email(&row.student_email, &request.student_email)
                    && row.normalized_text() == template.normalized_text()
            });

            match existing {
                Some(row) if row.student_answer.is_some() => {}
                Some(row) => {
                    row.student_answer = Some(option);
                    row.result = result;
                    echoed += 1;
                }
                None => {
                    let id = state.next_row_id;
                    state.next_row_id += 1;
                    state.rows.push(QuestionRow {
                        id: QuestionId(id),
                        student_answer: Some(option),
                        result,
                        student_email: request.student_email.clone(),
                        ..template
                    });
                    echoed += 1;
                }
            }
        }
        echoed
    }
}

#[async_trait]
impl ExamBackend for FakeBackend {
    async fn fetch_students(&self) -> Result<Vec<StudentRecord>, BackendError> {
        let state = self.state();
        if state.fail_fetches {
            return Err(BackendError::Transport {
                endpoint: FAKE_ENDPOINT.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(state.students.clone())
    }

    async fn fetch_question_bank(
        &self,
        exam_id: Option<ExamId>,
    ) -> Result<Vec<QuestionRow>, BackendError> {
        let gate = {
            let mut state = self.state();
            state.question_fetches.push(exam_id);
            exam_id.and_then(|id| state.exam_gates.remove(&id))
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let state = self.state();
        if state.fail_fetches {
            return Err(BackendError::Transport {
                endpoint: FAKE_ENDPOINT.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(state
            .rows
            .iter()
            .filter(|row| exam_id.map_or(true, |id| row.exam.id == id))
            .cloned()
            .collect())
    }

    async fn submit_answers(
        &self,
        request: &SubmitRequest,
        request_id: &str,
    ) -> Result<SubmitReceipt, BackendError> {
        let gate = {
            let mut state = self.state();
            state.submissions.push(request.clone());
            state.request_ids.push(request_id.to_string());
            state.submit_gate.take()
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let mut state = self.state();
        if state.fail_submits {
            return Err(BackendError::Timeout { endpoint: FAKE_ENDPOINT.to_string() });
        }
        if let Some((status, body)) = state.reject_submits.clone() {
            return Err(BackendError::Status { endpoint: FAKE_ENDPOINT.to_string(), status, body });
        }
        let echoed_rows = Self::apply_submission(&mut state, request);
        Ok(SubmitReceipt { echoed_rows })
    }
}
