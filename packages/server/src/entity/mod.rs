pub mod event;
pub mod event_participant;
pub mod submission;
