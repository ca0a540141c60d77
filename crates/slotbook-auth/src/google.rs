//! Google OAuth2 app credentials and token refresh.

use crate::error::AuthError;
use crate::oauth::{request_refresh, TokenResponse};
use crate::token::{GoogleTokenSet, TokenRefresh};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub struct GoogleOAuth2Provider {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: reqwest::Client,
}

impl GoogleOAuth2Provider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Override the token endpoint (used against mock servers).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Exchange a refresh token for a new access token.
    #[tracing::instrument(skip(self, refresh_token), level = "info")]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        request_refresh(
            &self.http,
            &self.token_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
            "google",
        )
        .await
    }

    /// Refresh the given token set, producing the new state with `expiry_date`
    /// in milliseconds.
    pub async fn refresh(&self, token_set: &GoogleTokenSet) -> Result<TokenRefresh, AuthError> {
        let refresh_token = token_set
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken("google"))?;

        let response = self.refresh_token(refresh_token).await?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        Ok(TokenRefresh {
            access_token: response.access_token,
            expiry_date: now_ms + response.expires_in * 1000,
            refresh_token: response.refresh_token,
        })
    }
}
