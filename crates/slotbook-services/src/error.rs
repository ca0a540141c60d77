//! Service error types.

use slotbook_calendar::CalendarError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Credential {credential_id} not found for user {username}")]
    CredentialNotFound { username: String, credential_id: i64 },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store document: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User {0} has no connected calendar")]
    NoCalendarConnected(String),

    #[error("Invalid booking request: {0}")]
    InvalidRequest(String),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(username) => Self::UserNotFound(username),
            other => Self::Store(other),
        }
    }
}

impl BookingError {
    /// User-friendly error message for the booking page.
    pub fn user_message(&self) -> String {
        match self {
            Self::UserNotFound(_) => "This booking page does not exist.".to_string(),
            Self::NoCalendarConnected(_) => {
                "This user has not connected a calendar yet.".to_string()
            }
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Calendar(e) => e.user_message(),
            Self::Store(_) => "Something went wrong. Please try again later.".to_string(),
        }
    }
}
