//! Notification error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("No recipients")]
    NoRecipients,

    #[error("Failed to render template: {0}")]
    Template(#[from] askama::Error),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

impl NotifyError {
    pub(crate) fn invalid_address(address: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether a later attempt could succeed. Nothing retries today; callers log this.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp(e) if e.is_transient())
    }
}
