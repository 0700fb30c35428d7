use std::collections::HashSet;

use serde::Serialize;

use crate::domain::{AnswerOption, ClassId, ExamId, QuestionId, QuestionRow};
use crate::errors::EngineError;

/// Rendering and submission template: the first row seen for one normalized question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalQuestion {
    pub id: QuestionId,
    pub text: String,
    pub options: [String; 4],
    pub correct_option: Option<AnswerOption>,
}

/// Keeps only rows of `exam_id` owned by `class_id`.
///
/// An empty result is an authorization failure, not an empty exam: it fires even when the
/// collaborator returned plenty of rows for the id under some other class.
pub fn validate_exam_rows(
    exam_id: ExamId,
    class_id: ClassId,
    rows: Vec<QuestionRow>,
) -> Result<Vec<QuestionRow>, EngineError> {
    let fetched = rows.len();
    let surviving: Vec<QuestionRow> = rows
        .into_iter()
        .filter(|row| row.exam.id == exam_id && row.exam.class_id == class_id)
        .collect();

    let discarded = fetched - surviving.len();
    if discarded > 0 {
        tracing::warn!(
            exam_id = %exam_id,
            class_id = %class_id,
            discarded,
            fetched,
            "Discarded question rows outside the student's class or exam"
        );
    }

    if surviving.is_empty() {
        return Err(EngineError::ExamClassMismatch { exam_id, class_id });
    }

    Ok(surviving)
}

pub fn canonicalize(rows: &[QuestionRow]) -> Vec<CanonicalQuestion> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut questions = Vec::new();

    for row in rows {
        let text = row.normalized_text();
        if !seen.insert(text) {
            continue;
        }
        questions.push(CanonicalQuestion {
            id: row.id,
            text: text.to_string(),
            options: row.options.clone(),
            correct_option: row.correct_option,
        });
    }

    questions
}
