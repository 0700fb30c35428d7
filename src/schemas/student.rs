use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::domain::{ClassId, StudentId, StudentRecord};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentPayload {
    pub(crate) id: i64,
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[serde(alias = "class_id")]
    pub(crate) class_id: i64,
}

impl From<StudentPayload> for StudentRecord {
    fn from(payload: StudentPayload) -> Self {
        Self {
            id: StudentId(payload.id),
            email: payload.email.trim().to_string(),
            class_id: ClassId(payload.class_id),
        }
    }
}

pub(crate) fn parse_directory(body: Value) -> Result<Vec<StudentRecord>, serde_json::Error> {
    let items: Vec<Value> = serde_json::from_value(body)?;
    Ok(super::decode_rows::<StudentPayload, StudentRecord>(items, "student"))
}
