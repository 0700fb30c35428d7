pub mod answers;
pub mod catalog;
pub mod dedup;
pub mod identity;
pub mod reconcile;
pub mod scoring;
pub mod submission;
