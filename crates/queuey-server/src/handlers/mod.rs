pub mod application;
pub mod common;
pub mod messages;
pub mod queue;
