// Analysis workflow: state machine, progress phases, session runner, HTTP handlers.

pub mod handlers;
pub mod machine;
pub mod phases;
pub mod session;

pub use machine::{InFlightKind, WorkflowError};
