pub mod configuration;
pub use configuration::*;

pub mod controller;
pub use controller::*;

pub mod error_handling;

pub mod network;

pub mod session_management;
pub use session_management::{
    Accepted, ConditionKind, Notification, Session, SessionEvent, SessionState, SessionView,
    StartOptions, StartRequest,
};

#[cfg(test)]
mod test_support;
