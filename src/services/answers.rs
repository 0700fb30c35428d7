use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{AnswerOption, QuestionId};

pub type AnswerMap = BTreeMap<QuestionId, AnswerOption>;
pub type LockedSet = BTreeSet<QuestionId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerWrite {
    Recorded,
    /// The server already holds an answer for this question; the write was ignored.
    Locked,
    /// Not a canonical question of the loaded exam; the write was ignored.
    UnknownQuestion,
}

/// Local answer state for one loaded exam. The only writer of unlocked answers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    question_ids: BTreeSet<QuestionId>,
    answers: AnswerMap,
    locked: LockedSet,
}

impl AnswerSheet {
    pub fn new(question_ids: impl IntoIterator<Item = QuestionId>) -> Self {
        Self { question_ids: question_ids.into_iter().collect(), ..Self::default() }
    }

    /// Records a server-held answer and locks the question. Only reconciliation calls this.
    pub(crate) fn lock_with(&mut self, question_id: QuestionId, option: AnswerOption) {
        if !self.question_ids.contains(&question_id) {
            return;
        }
        self.answers.insert(question_id, option);
        self.locked.insert(question_id);
    }

    pub fn set_answer(&mut self, question_id: QuestionId, option: AnswerOption) -> AnswerWrite {
        if self.locked.contains(&question_id) {
            return AnswerWrite::Locked;
        }
        if !self.question_ids.contains(&question_id) {
            return AnswerWrite::UnknownQuestion;
        }
        self.answers.insert(question_id, option);
        AnswerWrite::Recorded
    }

    pub fn answer(&self, question_id: QuestionId) -> Option<AnswerOption> {
        self.answers.get(&question_id).copied()
    }

    pub fn is_locked(&self, question_id: QuestionId) -> bool {
        self.locked.contains(&question_id)
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn locked(&self) -> &LockedSet {
        &self.locked
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    pub fn total(&self) -> usize {
        self.question_ids.len()
    }
}
