mod common;
mod event;
mod pg_store;
mod submission;
