//! Calendar provider error types.

use slotbook_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("No calendar adapter for credential type '{0}'")]
    NoAdapter(String),

    #[error("Invalid {kind} credential: {message}")]
    InvalidCredential { kind: String, message: String },

    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Token expired")]
    TokenExpired,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl CalendarError {
    pub(crate) fn invalid_credential(kind: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidCredential {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }

    /// User-friendly error message for display on the booking page.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoAdapter(_) => "This calendar type is not supported.".to_string(),
            Self::InvalidCredential { .. } => {
                "The calendar connection is broken. Please reconnect your calendar.".to_string()
            }
            Self::Auth(e) => e.user_message().to_string(),
            Self::AuthRequired => "Access to the calendar was denied.".to_string(),
            Self::TokenExpired => {
                "The calendar session has expired. Please reconnect your calendar.".to_string()
            }
            Self::RateLimited(secs) => format!("Too many requests. Please wait {} seconds.", secs),
            Self::ApiError { .. } | Self::InvalidResponse(_) => {
                "The calendar provider could not complete the request.".to_string()
            }
            Self::NetworkError(_) => "Network error. Check your connection.".to_string(),
        }
    }
}

/// Map a provider HTTP response to its JSON body or a typed error.
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CalendarError> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidResponse(format!("JSON parse error: {}", e)))
    } else if status.as_u16() == 401 {
        Err(CalendarError::TokenExpired)
    } else if status.as_u16() == 403 {
        Err(CalendarError::AuthRequired)
    } else if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        Err(CalendarError::RateLimited(retry_after))
    } else {
        let text = response.text().await.unwrap_or_default();
        Err(CalendarError::ApiError {
            status: status.as_u16(),
            message: text,
        })
    }
}
