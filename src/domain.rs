use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(StudentId);
numeric_id!(ClassId);
numeric_id!(ExamId);
numeric_id!(QuestionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("option {0} is outside 1..=4")]
pub struct InvalidOption(pub u8);

/// One of the four choices of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AnswerOption(u8);

impl AnswerOption {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Result<Self, InvalidOption> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidOption(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for AnswerOption {
    type Error = InvalidOption;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AnswerOption> for u8 {
    fn from(value: AnswerOption) -> Self {
        value.0
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The principal the engine acts for. Passed in explicitly; nothing is read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    principal: String,
}

impl Session {
    pub fn new(principal: impl Into<String>) -> Self {
        Self { principal: principal.into().trim().to_string() }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub(crate) fn is_principal(&self, email: &str) -> bool {
        same_email(&self.principal, email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub email: String,
    pub class_id: ClassId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamDescriptor {
    pub id: ExamId,
    pub title: String,
    pub class_id: ClassId,
}

/// A raw question-bank row. The feed carries one row per (question, student) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionRow {
    pub id: QuestionId,
    pub question: String,
    pub options: [String; 4],
    pub correct_option: Option<AnswerOption>,
    pub student_answer: Option<AnswerOption>,
    pub result: Option<bool>,
    pub exam: ExamDescriptor,
    pub student_email: String,
}

impl QuestionRow {
    pub fn normalized_text(&self) -> &str {
        normalize_text(&self.question)
    }
}

pub fn normalize_text(text: &str) -> &str {
    text.trim()
}

pub(crate) fn same_email(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}
