use crate::domain::{Session, StudentRecord};
use crate::errors::EngineError;

/// Finds the directory entry whose email matches the session principal (case-insensitive).
pub fn resolve_identity(
    session: &Session,
    directory: &[StudentRecord],
) -> Result<StudentRecord, EngineError> {
    directory
        .iter()
        .find(|student| session.is_principal(&student.email))
        .cloned()
        .ok_or_else(|| EngineError::IdentityNotFound(session.principal().to_string()))
}
