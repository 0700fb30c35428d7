mod backend;
mod rest;

pub use backend::{BackendError, ExamBackend};
pub use rest::RestBackend;
