use serde::Serialize;

use crate::domain::{AnswerOption, QuestionId, QuestionRow, Session};
use crate::services::answers::AnswerSheet;
use crate::services::dedup::CanonicalQuestion;
use crate::services::reconcile::principal_row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    /// No result flag from the server: no correct option configured, or not graded yet.
    Ungraded,
}

impl From<Option<bool>> for QuestionOutcome {
    fn from(result: Option<bool>) -> Self {
        match result {
            Some(true) => Self::Correct,
            Some(false) => Self::Incorrect,
            None => Self::Ungraded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub text: String,
    pub chosen: Option<AnswerOption>,
    /// Only filled in once answers are revealed.
    pub correct_option: Option<AnswerOption>,
    pub outcome: QuestionOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

pub fn grade_questions(
    questions: &[CanonicalQuestion],
    rows: &[QuestionRow],
    session: &Session,
    sheet: &AnswerSheet,
    reveal_answers: bool,
) -> Vec<QuestionResult> {
    questions
        .iter()
        .map(|question| {
            let result =
                principal_row(rows, session, &question.text).and_then(|row| row.result);

            QuestionResult {
                question_id: question.id,
                text: question.text.clone(),
                chosen: sheet.answer(question.id),
                correct_option: if reveal_answers { question.correct_option } else { None },
                outcome: QuestionOutcome::from(result),
            }
        })
        .collect()
}

/// Ungraded questions count toward the total but never the numerator.
pub fn score(results: &[QuestionResult]) -> Score {
    Score {
        correct: results.iter().filter(|result| result.outcome == QuestionOutcome::Correct).count(),
        total: results.len(),
    }
}
