//! OAuth token state and refresh grants for connected calendar accounts.

pub mod error;
pub mod google;
pub mod microsoft;
pub mod oauth;
pub mod token;

pub use error::AuthError;
pub use google::GoogleOAuth2Provider;
pub use microsoft::MicrosoftOAuth2Provider;
pub use oauth::TokenResponse;
pub use token::{GoogleTokenSet, MicrosoftTokenSet, TokenRefresh};
