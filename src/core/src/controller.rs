//! Driver of the reconciliation core.
//!
//! [`controller_handler::Controller`] owns the [`SessionController`](crate::session_management::SessionController)
//! on a single task and multiplexes user commands with poll and countdown wake-ups, so every
//! mutation of the session happens on one logical execution context.
//! [`controller_handler::ControllerHandle`] is the cloneable front door used by the binary.

pub mod controller_handler;

pub use controller_handler::{Controller, ControllerHandle};
