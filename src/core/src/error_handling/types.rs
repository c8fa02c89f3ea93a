use std::fmt;

use crate::session_management::SessionState;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Rejections raised locally, before any network call is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyChannel,
    InvalidChannel(String),
    NonPositiveDuration,
    NoViewers,
    AboveQuota { requested: u32, max: u32 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyChannel => write!(f, "Channel name must not be empty"),
            ValidationError::InvalidChannel(c) => write!(f, "Invalid channel name: {}", c),
            ValidationError::NonPositiveDuration => {
                write!(f, "Duration must be a positive number of minutes")
            }
            ValidationError::NoViewers => write!(f, "Target viewer count must be at least 1"),
            ValidationError::AboveQuota { requested, max } => write!(
                f,
                "Requested {} viewers but the account allows at most {}",
                requested, max
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingCredential,
    CredentialRejected,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "Not logged in: no credential available"),
            AuthError::CredentialRejected => {
                write!(f, "Session expired: the server rejected the credential")
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Failure of a single call against the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Timeout,
    Connection(String),
    Unauthorized,
    Rejected { status: u16, detail: String },
    Decode(String),
    Cancelled,
}

impl ApiError {
    /// Timeouts and connection failures are worth retrying as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::Connection(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Timeout => write!(f, "Request timed out"),
            ApiError::Connection(e) => write!(f, "Connection failed: {}", e),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Rejected { status, detail } => {
                write!(f, "Server rejected request ({}): {}", status, detail)
            }
            ApiError::Decode(e) => write!(f, "Malformed response: {}", e),
            ApiError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    AlreadyActive,
    Validation(ValidationError),
    Auth(AuthError),
    Network(ApiError),
    ServerRejection(String),
}

impl StartError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StartError::Network(e) if e.is_transient())
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::AlreadyActive => write!(f, "A session is already active"),
            StartError::Validation(e) => write!(f, "Invalid start request: {}", e),
            StartError::Auth(e) => write!(f, "Authentication error: {}", e),
            StartError::Network(e) => write!(f, "Network error: {}", e),
            StartError::ServerRejection(detail) => write!(f, "Error starting session: {}", detail),
        }
    }
}

impl std::error::Error for StartError {}

impl From<ValidationError> for StartError {
    fn from(err: ValidationError) -> Self {
        StartError::Validation(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    Auth(AuthError),
    Network(ApiError),
    ServerRejection(String),
}

impl StopError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StopError::Network(e) if e.is_transient())
    }
}

impl fmt::Display for StopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopError::Auth(e) => write!(f, "Authentication error: {}", e),
            StopError::Network(e) => write!(f, "Network error: {}", e),
            StopError::ServerRejection(detail) => write!(f, "Error stopping session: {}", detail),
        }
    }
}

impl std::error::Error for StopError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidTransition { from, action } => {
                write!(f, "Cannot {} while session is {}", action, from)
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
pub enum ControllerError {
    Config(ConfigError),
    Client(String),
    Auth(AuthError),
    Api(ApiError),
    Session(SessionError),
    Start(StartError),
    Stop(StopError),
    ChannelClosed,
}

impl ControllerError {
    /// Whether running the same command again may succeed without changing anything.
    pub fn is_retryable(&self) -> bool {
        match self {
            ControllerError::Start(e) => e.is_retryable(),
            ControllerError::Stop(e) => e.is_retryable(),
            ControllerError::Api(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Config(e) => write!(f, "Configuration error: {}", e),
            ControllerError::Client(e) => write!(f, "HTTP client initialization failed: {}", e),
            ControllerError::Auth(e) => write!(f, "Authentication error: {}", e),
            ControllerError::Api(e) => write!(f, "API error: {}", e),
            ControllerError::Session(e) => write!(f, "Session error: {}", e),
            ControllerError::Start(e) => write!(f, "{}", e),
            ControllerError::Stop(e) => write!(f, "{}", e),
            ControllerError::ChannelClosed => write!(f, "Controller is no longer running"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::Config(err)
    }
}

impl From<AuthError> for ControllerError {
    fn from(err: AuthError) -> Self {
        ControllerError::Auth(err)
    }
}

impl From<ApiError> for ControllerError {
    fn from(err: ApiError) -> Self {
        ControllerError::Api(err)
    }
}

impl From<SessionError> for ControllerError {
    fn from(err: SessionError) -> Self {
        ControllerError::Session(err)
    }
}

impl From<StartError> for ControllerError {
    fn from(err: StartError) -> Self {
        ControllerError::Start(err)
    }
}

impl From<StopError> for ControllerError {
    fn from(err: StopError) -> Self {
        ControllerError::Stop(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_retryable() {
        assert!(StartError::Network(ApiError::Timeout).is_retryable());
        assert!(!StartError::AlreadyActive.is_retryable());
        assert!(!StartError::ServerRejection("quota exceeded".into()).is_retryable());
        assert!(StopError::Network(ApiError::Connection("reset".into())).is_retryable());
        assert!(!StopError::Auth(AuthError::CredentialRejected).is_retryable());
    }

    #[test]
    fn malformed_answers_are_not_retryable() {
        let decode = ApiError::Decode("expected value".into());
        assert!(!StartError::Network(decode.clone()).is_retryable());
        assert!(!StopError::Network(ApiError::Cancelled).is_retryable());
        assert!(!ControllerError::Api(decode).is_retryable());
    }

    #[test]
    fn controller_errors_forward_retryability() {
        assert!(ControllerError::from(StartError::Network(ApiError::Timeout)).is_retryable());
        assert!(ControllerError::from(StopError::Network(ApiError::Timeout)).is_retryable());
        assert!(ControllerError::from(ApiError::Connection("reset".into())).is_retryable());
        assert!(!ControllerError::from(StartError::AlreadyActive).is_retryable());
        assert!(!ControllerError::ChannelClosed.is_retryable());
    }

    #[test]
    fn transient_api_errors() {
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::Connection("refused".into()).is_transient());
        assert!(!ApiError::Unauthorized.is_transient());
        assert!(!ApiError::Rejected {
            status: 500,
            detail: "boom".into()
        }
        .is_transient());
    }

    #[test]
    fn server_detail_is_surfaced_verbatim() {
        let err = StartError::ServerRejection("You already have a session running.".into());
        assert_eq!(
            err.to_string(),
            "Error starting session: You already have a session running."
        );
    }
}
