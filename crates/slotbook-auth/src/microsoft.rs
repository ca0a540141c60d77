//! Microsoft identity platform token refresh for Office 365 calendars.

use crate::error::AuthError;
use crate::oauth::{request_refresh, TokenResponse};
use crate::token::{MicrosoftTokenSet, TokenRefresh};

const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const MICROSOFT_SCOPE: &str = "User.Read Calendars.Read Calendars.ReadWrite";

pub struct MicrosoftOAuth2Provider {
    client_id: String,
    client_secret: String,
    scope: String,
    token_url: String,
    http: reqwest::Client,
}

impl MicrosoftOAuth2Provider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            scope: MICROSOFT_SCOPE.to_string(),
            token_url: MICROSOFT_TOKEN_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Exchange a refresh token for a new access token.
    #[tracing::instrument(skip(self, refresh_token), level = "info")]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        request_refresh(
            &self.http,
            &self.token_url,
            &[
                ("scope", self.scope.as_str()),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
                ("client_secret", self.client_secret.as_str()),
            ],
            "office365",
        )
        .await
    }

    /// Refresh the given token set, producing the new state with `expiry_date`
    /// as `now (seconds) + expires_in`.
    pub async fn refresh(&self, token_set: &MicrosoftTokenSet) -> Result<TokenRefresh, AuthError> {
        if token_set.refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken("office365"));
        }

        let response = self.refresh_token(&token_set.refresh_token).await?;
        let now_secs = chrono::Utc::now().timestamp();

        Ok(TokenRefresh {
            access_token: response.access_token,
            expiry_date: now_secs + response.expires_in,
            refresh_token: response.refresh_token,
        })
    }
}
