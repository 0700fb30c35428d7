use serde::Deserialize;
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::domain::{AnswerOption, ClassId, ExamDescriptor, ExamId, QuestionId, QuestionRow};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionFeed {
    Rows(Vec<Value>),
    Envelope { mcq_answers: Vec<Value> },
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamDescriptorPayload {
    pub(crate) id: i64,
    #[validate(custom(function = "not_blank"))]
    pub(crate) title: String,
    #[serde(alias = "class_id")]
    pub(crate) class_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionRowPayload {
    pub(crate) id: i64,
    #[validate(custom(function = "not_blank"))]
    pub(crate) question: String,
    pub(crate) option1: String,
    pub(crate) option2: String,
    pub(crate) option3: String,
    pub(crate) option4: String,
    #[serde(default, alias = "correct_option")]
    #[validate(range(min = 1, max = 4, message = "correctOption must be between 1 and 4"))]
    pub(crate) correct_option: Option<u8>,
    #[serde(default, alias = "student_answer")]
    #[validate(range(min = 1, max = 4, message = "studentAnswer must be between 1 and 4"))]
    pub(crate) student_answer: Option<u8>,
    #[serde(default)]
    pub(crate) result: Option<bool>,
    #[serde(alias = "exam_descriptor")]
    #[validate(nested)]
    pub(crate) exam_descriptor: ExamDescriptorPayload,
    #[serde(alias = "student_email")]
    #[validate(custom(function = "not_blank"))]
    pub(crate) student_email: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn to_option(value: Option<u8>) -> Option<AnswerOption> {
    // Range is enforced by validation before conversion.
    value.and_then(|raw| AnswerOption::new(raw).ok())
}

impl From<QuestionRowPayload> for QuestionRow {
    fn from(payload: QuestionRowPayload) -> Self {
        Self {
            id: QuestionId(payload.id),
            question: payload.question,
            options: [payload.option1, payload.option2, payload.option3, payload.option4],
            correct_option: to_option(payload.correct_option),
            student_answer: to_option(payload.student_answer),
            result: payload.result,
            exam: ExamDescriptor {
                id: ExamId(payload.exam_descriptor.id),
                title: payload.exam_descriptor.title.trim().to_string(),
                class_id: ClassId(payload.exam_descriptor.class_id),
            },
            student_email: payload.student_email.trim().to_string(),
        }
    }
}

/// Accepts either a bare array of rows or the `{ "mcq_answers": [...] }` envelope.
pub(crate) fn parse_question_feed(body: Value) -> Result<Vec<QuestionRow>, serde_json::Error> {
    let items = match serde_json::from_value::<QuestionFeed>(body)? {
        QuestionFeed::Rows(items) => items,
        QuestionFeed::Envelope { mcq_answers } => mcq_answers,
    };
    Ok(super::decode_rows::<QuestionRowPayload, QuestionRow>(items, "question"))
}
