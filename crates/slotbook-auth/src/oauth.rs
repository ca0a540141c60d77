//! Refresh-token grant shared by the provider implementations.

use serde::Deserialize;

use crate::error::AuthError;

/// Token endpoint response for a refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600 // Default 1 hour
}

/// POST a form-encoded refresh grant and parse the token response.
///
/// Non-success responses are logged with their body and returned as
/// `AuthError::RefreshRejected`.
pub(crate) async fn request_refresh(
    http: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
    provider: &'static str,
) -> Result<TokenResponse, AuthError> {
    let response = http.post(token_url).form(form).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(provider, status = status.as_u16(), %body, "Token refresh failed");
        return Err(AuthError::RefreshRejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))
}
