use thiserror::Error;

/// Input rejected locally, before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a rating between 1 and 5")]
    MissingRating,
    #[error("Please write a comment before submitting")]
    EmptyComment,
    #[error("Name must not be empty")]
    EmptyName,
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error(
        "Password must be at least 8 characters and contain upper and lower case letters, a digit and a special character"
    )]
    WeakPassword,
    #[error("Message must not be empty")]
    EmptyMessage,
}

/// Errors produced by the storefront client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Request rejected by CSRF protection: {0}")]
    CsrfRejected(String),

    #[error("Server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Local storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Real-time channel error: {0}")]
    Channel(String),

    #[error("Chat is unavailable after {attempts} connection attempts")]
    Unavailable { attempts: u32 },

    #[error("Not signed in")]
    MissingCredentials,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Channel(err.to_string())
    }
}

/// Failures reported by a position lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timeout")]
    Timeout,
    #[error("unknown error")]
    Unknown,
}

impl GeolocationError {
    /// Maps the numeric codes used by position providers (1, 2, 3).
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => GeolocationError::PermissionDenied,
            2 => GeolocationError::PositionUnavailable,
            3 => GeolocationError::Timeout,
            _ => GeolocationError::Unknown,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            GeolocationError::PermissionDenied => {
                "Location access was denied. Please enable it to detect your address."
            }
            GeolocationError::PositionUnavailable => "Location information is unavailable.",
            GeolocationError::Timeout => "The request to get your location timed out.",
            GeolocationError::Unknown => "An unknown error occurred while getting your location.",
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
