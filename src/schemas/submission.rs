use serde::Serialize;
use serde_json::Value;

use crate::domain::{AnswerOption, ExamId, QuestionId};

/// Body of the save call. `answers` always covers every canonical question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub exam_id: ExamId,
    pub student_email: String,
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub id: QuestionId,
    pub student_answer: Option<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub echoed_rows: usize,
}

/// The collaborator echoes updated rows; only their count is kept, server truth is re-fetched.
pub(crate) fn parse_receipt(body: &str) -> SubmitReceipt {
    if body.trim().is_empty() {
        return SubmitReceipt { echoed_rows: 0 };
    }

    let echoed_rows = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items.len(),
        Ok(Value::Object(map)) => {
            map.get("mcq_answers").and_then(Value::as_array).map(Vec::len).unwrap_or(0)
        }
        _ => 0,
    };
    SubmitReceipt { echoed_rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submit_request_serializes_nulls_for_unanswered() {
        let request = SubmitRequest {
            exam_id: ExamId(11),
            student_email: "ana@school.org".to_string(),
            answers: vec![
                SubmittedAnswer { id: QuestionId(101), student_answer: AnswerOption::new(2).ok() },
                SubmittedAnswer { id: QuestionId(102), student_answer: None },
            ],
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({
                "examId": 11,
                "studentEmail": "ana@school.org",
                "answers": [
                    {"id": 101, "studentAnswer": 2},
                    {"id": 102, "studentAnswer": null}
                ]
            })
        );
    }

    #[test]
    fn parse_receipt_counts_echoed_rows() {
        assert_eq!(parse_receipt("[{\"id\":1},{\"id\":2}]").echoed_rows, 2);
        assert_eq!(parse_receipt("{\"mcq_answers\":[{\"id\":1}]}").echoed_rows, 1);
        assert_eq!(parse_receipt("").echoed_rows, 0);
        assert_eq!(parse_receipt("ok").echoed_rows, 0);
    }
}
