use sha2::{Digest, Sha256};

use crate::domain::ExamId;
use crate::errors::EngineError;
use crate::schemas::submission::{SubmitRequest, SubmittedAnswer};
use crate::services::answers::AnswerMap;
use crate::services::dedup::CanonicalQuestion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPlan {
    request: SubmitRequest,
    answered: usize,
}

impl SubmissionPlan {
    pub fn request(&self) -> &SubmitRequest {
        &self.request
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    pub fn total(&self) -> usize {
        self.request.answers.len()
    }

    pub fn is_partial(&self) -> bool {
        self.answered < self.total()
    }

    /// Partial submissions need an explicit confirmation from the caller before anything is sent.
    pub fn check_gate(&self, confirmed: bool) -> Result<(), EngineError> {
        if self.is_partial() && !confirmed {
            return Err(EngineError::PartialConfirmationRequired {
                answered: self.answered,
                total: self.total(),
            });
        }
        Ok(())
    }

    /// SHA-256 of the serialized payload; identical payloads share a digest.
    pub fn digest(&self) -> String {
        let body = serde_json::to_vec(&self.request).unwrap_or_default();
        hex::encode(Sha256::digest(&body))
    }
}

/// One entry per canonical question, in display order, `None` for unanswered ones.
pub fn build_submission(
    exam_id: ExamId,
    student_email: &str,
    questions: &[CanonicalQuestion],
    answers: &AnswerMap,
) -> SubmissionPlan {
    let entries: Vec<SubmittedAnswer> = questions
        .iter()
        .map(|question| SubmittedAnswer {
            id: question.id,
            student_answer: answers.get(&question.id).copied(),
        })
        .collect();
    let answered = entries.iter().filter(|entry| entry.student_answer.is_some()).count();

    SubmissionPlan {
        request: SubmitRequest {
            exam_id,
            student_email: student_email.to_string(),
            answers: entries,
        },
        answered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuestionId;
    use crate::test_support::{canonical, opt};

    fn questions() -> Vec<CanonicalQuestion> {
        vec![canonical(101, "q1"), canonical(102, "q2"), canonical(103, "q3")]
    }

    #[test]
    fn payload_covers_every_canonical_question() {
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId(101), opt(2));
        answers.insert(QuestionId(103), opt(4));

        let plan = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);
        assert_eq!(plan.total(), 3);
        assert_eq!(plan.answered(), 2);
        assert_eq!(
            plan.request().answers,
            vec![
                SubmittedAnswer { id: QuestionId(101), student_answer: Some(opt(2)) },
                SubmittedAnswer { id: QuestionId(102), student_answer: None },
                SubmittedAnswer { id: QuestionId(103), student_answer: Some(opt(4)) },
            ]
        );
    }

    #[test]
    fn payload_length_is_independent_of_answers() {
        let mut answers = AnswerMap::new();
        let empty = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);
        answers.insert(QuestionId(102), opt(1));
        let one = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);

        assert_eq!(empty.total(), 3);
        assert_eq!(one.total(), 3);
        assert_eq!(one.request().answers.iter().filter(|a| a.student_answer.is_none()).count(), 2);
    }

    #[test]
    fn partial_gate_requires_confirmation() {
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId(101), opt(2));
        let plan = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);

        assert!(matches!(
            plan.check_gate(false),
            Err(EngineError::PartialConfirmationRequired { answered: 1, total: 3 })
        ));
        assert!(plan.check_gate(true).is_ok());
    }

    #[test]
    fn complete_plan_passes_gate_without_confirmation() {
        let answers: AnswerMap =
            questions().iter().map(|question| (question.id, opt(1))).collect();
        let plan = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);

        assert!(!plan.is_partial());
        assert!(plan.check_gate(false).is_ok());
    }

    #[test]
    fn identical_payloads_share_a_digest() {
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId(101), opt(2));
        let first = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);
        let second = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);
        answers.insert(QuestionId(102), opt(3));
        let changed = build_submission(ExamId(11), "ana@school.org", &questions(), &answers);

        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.digest().len(), 64);
        assert_ne!(first.digest(), changed.digest());
    }
}
