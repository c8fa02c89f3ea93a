//! # Remote API client
//!
//! [`SessionApi`] is the seam between the reconciliation core and the server. The core is
//! generic over it so tests can script responses; [`HttpSessionApi`] is the production
//! implementation over `reqwest`.
//!
//! ```text
//! ┌───────────────────┐  start / stop   ┌────────────────┐   HTTP + JSON   ┌────────┐
//! │ SessionController │────────────────▶│ HttpSessionApi │────────────────▶│ Server │
//! │                   │◀────────────────│                │◀────────────────│        │
//! └───────────────────┘  StatusSnapshot └────────────────┘                 └────────┘
//! ```
//!
//! Every call carries `Authorization: Bearer <token>` and is bounded by the configured
//! timeout. Error mapping:
//! - timeout → [`ApiError::Timeout`]
//! - connection / IO failure → [`ApiError::Connection`]
//! - 401 → [`ApiError::Unauthorized`]
//! - any other non-2xx → [`ApiError::Rejected`] with the server's `detail`
//!
//! A 2xx answer to start or stop is a success whatever its body holds; the confirmation
//! message is empty when the body carries none.

use std::future::Future;
use std::time::Duration;

use log::{debug, trace};
use reqwest::{Client, Response, StatusCode};

use super::status_decoder::{decode_status, StatusSnapshot};
use super::types::{ErrorResponse, MessageResponse, StartPayload, UserProfile};
use crate::error_handling::types::ApiError;

pub trait SessionApi: Send + Sync + 'static {
    /// `GET /api/me`
    fn fetch_profile(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;

    /// `POST /api/start`, resolves to the server's confirmation message.
    fn start(
        &self,
        token: &str,
        payload: &StartPayload,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// `POST /api/stop`, resolves to the server's confirmation message.
    fn stop(&self, token: &str) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// `GET /api/status`, already normalized.
    fn fetch_status(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<StatusSnapshot, ApiError>> + Send;
}

/// `reqwest`-backed [`SessionApi`].
#[derive(Debug, Clone)]
pub struct HttpSessionApi {
    http: Client,
    origin: String,
}

impl HttpSessionApi {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    async fn checked(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        let detail = match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(err) if !err.detail.is_empty() => err.detail,
            _ => String::from_utf8_lossy(&body).trim().to_string(),
        };
        debug!("Server answered {}: {}", status, detail);
        Err(ApiError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    async fn message(response: Response) -> Result<String, ApiError> {
        let response = Self::checked(response).await?;
        let body = response.bytes().await.map_err(map_transport_error)?;
        if body.is_empty() {
            return Ok(String::new());
        }
        match serde_json::from_slice::<MessageResponse>(&body) {
            Ok(reply) => Ok(reply.message.unwrap_or_default()),
            Err(e) => {
                // The status code already confirmed the request.
                debug!(
                    "Accepted without a message body ({}): {}",
                    e,
                    String::from_utf8_lossy(&body).trim()
                );
                Ok(String::new())
            }
        }
    }
}

impl SessionApi for HttpSessionApi {
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        trace!("GET /api/me");
        let response = self
            .http
            .get(self.url("/api/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::checked(response).await?;
        let body = response.bytes().await.map_err(map_transport_error)?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn start(&self, token: &str, payload: &StartPayload) -> Result<String, ApiError> {
        debug!(
            "POST /api/start channel={} views={} duration={}min",
            payload.channel, payload.views, payload.duration
        );
        let response = self
            .http
            .post(self.url("/api/start"))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::message(response).await
    }

    async fn stop(&self, token: &str) -> Result<String, ApiError> {
        debug!("POST /api/stop");
        let response = self
            .http
            .post(self.url("/api/stop"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::message(response).await
    }

    async fn fetch_status(&self, token: &str) -> Result<StatusSnapshot, ApiError> {
        trace!("GET /api/status");
        let response = self
            .http
            .get(self.url("/api/status"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::checked(response).await?;
        let body = response.bytes().await.map_err(map_transport_error)?;
        decode_status(&body)
    }
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Connection(err.to_string())
    }
}
