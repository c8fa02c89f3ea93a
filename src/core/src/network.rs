//! Network side of the client.
//!
//! Components:
//! - `types`: JSON wire types of the remote API.
//! - `status_decoder`: normalization of `/api/status` bodies into [`StatusSnapshot`].
//! - `api_client`: the [`SessionApi`] seam and its `reqwest` implementation.
//! - `credentials`: where the bearer token comes from, and where it goes when rejected.

pub mod api_client;
pub mod credentials;
pub mod status_decoder;
pub mod types;

#[cfg(test)]
mod integration_tests;

pub use api_client::{HttpSessionApi, SessionApi};
pub use credentials::{CredentialSource, FileCredentials, StaticCredentials};
pub use status_decoder::StatusSnapshot;
pub use types::{StartPayload, UserProfile};
