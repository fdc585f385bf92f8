pub mod event;
pub mod shared;
pub mod submission;
