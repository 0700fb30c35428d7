use serde::Serialize;

use crate::domain::{ClassId, ExamId, QuestionRow};
use crate::errors::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamSummary {
    pub exam_id: ExamId,
    pub title: String,
}

/// Exams visible to one class, in first-seen feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamCatalog {
    exams: Vec<ExamSummary>,
}

impl ExamCatalog {
    pub fn exams(&self) -> &[ExamSummary] {
        &self.exams
    }

    /// The exam to open without user input: the only one, or the numerically greatest id.
    pub fn preferred(&self) -> Option<ExamId> {
        self.exams.iter().map(|exam| exam.exam_id).max()
    }

    pub fn into_exams(self) -> Vec<ExamSummary> {
        self.exams
    }
}

/// Groups the unscoped bulk feed into the exams owned by `class_id`.
pub fn discover_exams(
    class_id: ClassId,
    rows: &[QuestionRow],
) -> Result<ExamCatalog, EngineError> {
    let mut exams: Vec<ExamSummary> = Vec::new();
    for row in rows.iter().filter(|row| row.exam.class_id == class_id) {
        if exams.iter().any(|exam| exam.exam_id == row.exam.id) {
            continue;
        }
        exams.push(ExamSummary { exam_id: row.exam.id, title: row.exam.title.clone() });
    }

    if exams.is_empty() {
        return Err(EngineError::NoExamsForClass(class_id));
    }

    Ok(ExamCatalog { exams })
}
