pub mod event;
pub mod submission;
