//! Authorization error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No refresh token stored for {0}")]
    MissingRefreshToken(&'static str),

    #[error("Token refresh rejected ({status}): {body}")]
    RefreshRejected { status: u16, body: String },

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingRefreshToken(_) | Self::RefreshRejected { .. } => {
                "The calendar connection has expired. Please reconnect your calendar."
            }
            Self::InvalidResponse(_) => "The calendar provider returned an unexpected response.",
            Self::Network(_) => "Network error. Check your connection.",
        }
    }
}
