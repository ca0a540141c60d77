//! Stored OAuth token sets for connected calendar accounts.
//!
//! Google keys follow the googleapis credential layout (`expiry_date` in Unix
//! milliseconds). Microsoft keys store `expiry_date` in Unix seconds.

use serde::{Deserialize, Serialize};

/// Google access tokens are refreshed this long before they expire.
const GOOGLE_EAGER_REFRESH_MS: i64 = 5 * 60 * 1000;

/// Token set stored for a Google Calendar credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoogleTokenSet {
    #[serde(default)]
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Expiration as Unix timestamp in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl GoogleTokenSet {
    /// Check if the access token is missing or within 5 minutes of expiry.
    /// Tokens without a recorded expiry are used as-is.
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expiry_date {
            Some(expiry) => now_ms >= expiry - GOOGLE_EAGER_REFRESH_MS,
            None => false,
        }
    }

    pub fn apply(&mut self, refresh: &TokenRefresh) {
        self.access_token = refresh.access_token.clone();
        self.expiry_date = Some(refresh.expiry_date);
        if let Some(rt) = &refresh.refresh_token {
            self.refresh_token = Some(rt.clone());
        }
    }
}

/// Token set stored for a Microsoft 365 credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MicrosoftTokenSet {
    pub access_token: String,

    pub refresh_token: String,

    /// Expiration as Unix timestamp in seconds
    pub expiry_date: i64,

    /// Mailbox owning the calendar, used for schedule queries
    pub email: String,
}

impl MicrosoftTokenSet {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.expiry_date < now_secs
    }

    pub fn apply(&mut self, refresh: &TokenRefresh) {
        self.access_token = refresh.access_token.clone();
        self.expiry_date = refresh.expiry_date;
        if let Some(rt) = &refresh.refresh_token {
            self.refresh_token = rt.clone();
        }
    }
}

/// New token state produced by a refresh grant.
///
/// `expiry_date` uses the unit of the token set it was produced for. The caller
/// is responsible for persisting it back into the stored credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenRefresh {
    pub access_token: String,

    pub expiry_date: i64,

    /// Present when the provider rotated the refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}
