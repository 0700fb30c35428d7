use std::collections::HashMap;

use crate::domain::{QuestionId, QuestionRow, Session};
use crate::services::answers::AnswerSheet;
use crate::services::dedup::CanonicalQuestion;

/// Builds the answer sheet for a freshly loaded exam from server-recorded answers.
///
/// Every principal row with a recorded answer locks its canonical question. When the feed
/// holds more than one answered row for the same text, the first one wins.
pub fn reconcile(
    questions: &[CanonicalQuestion],
    rows: &[QuestionRow],
    session: &Session,
) -> AnswerSheet {
    let by_text: HashMap<&str, QuestionId> =
        questions.iter().map(|question| (question.text.as_str(), question.id)).collect();
    let mut sheet = AnswerSheet::new(questions.iter().map(|question| question.id));

    for row in rows.iter().filter(|row| session.is_principal(&row.student_email)) {
        let Some(answer) = row.student_answer else {
            continue;
        };
        let Some(&question_id) = by_text.get(row.normalized_text()) else {
            continue;
        };
        if sheet.is_locked(question_id) {
            continue;
        }
        sheet.lock_with(question_id, answer);
    }

    sheet
}

/// The principal's row for one question text: the first answered one, the row `reconcile` locks
/// on, else the first unanswered one.
pub(crate) fn principal_row<'a>(
    rows: &'a [QuestionRow],
    session: &Session,
    text: &str,
) -> Option<&'a QuestionRow> {
    let mut unanswered = None;
    for row in rows
        .iter()
        .filter(|row| session.is_principal(&row.student_email) && row.normalized_text() == text)
    {
        if row.student_answer.is_some() {
            return Some(row);
        }
        unanswered.get_or_insert(row);
    }
    unanswered
}
