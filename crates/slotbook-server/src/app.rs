//! Wiring from configuration to a ready booking service.

use std::sync::Arc;

use anyhow::{Context, Result};
use slotbook_auth::{GoogleOAuth2Provider, MicrosoftOAuth2Provider};
use slotbook_calendar::{CalendarClient, GoogleCalendarSettings, MicrosoftGraphSettings};
use slotbook_core::Config;
use slotbook_notify::{ConfirmationNotifier, LogMailer, Mailer, SmtpMailer};
use slotbook_services::{BookingService, JsonFileStore};

/// Calendar client with both providers configured from the app credentials.
pub fn build_calendar_client(config: &Config) -> CalendarClient {
    let google = GoogleOAuth2Provider::new(
        config.google.client_id.clone(),
        config.google.client_secret.clone(),
    )
    .with_token_url(config.google.token_url.clone());

    let microsoft = MicrosoftOAuth2Provider::new(
        config.microsoft.client_id.clone(),
        config.microsoft.client_secret.clone(),
    )
    .with_token_url(config.microsoft.token_url.clone())
    .with_scope(config.microsoft.scope.clone());

    CalendarClient::with_defaults(
        GoogleCalendarSettings::new(Arc::new(google)).with_api_base(config.google.api_base.clone()),
        MicrosoftGraphSettings::new(Arc::new(microsoft))
            .with_graph_base(config.microsoft.graph_base.clone()),
    )
}

/// Open the user store and assemble the booking service.
pub fn build_service(config: &Config) -> Result<BookingService> {
    let store = Arc::new(
        JsonFileStore::open(&config.store.path).context("Failed to open user store")?,
    );

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).context("Failed to configure SMTP")?),
        None => {
            tracing::warn!("SMTP not configured, booking confirmations will not be emailed");
            Arc::new(LogMailer)
        }
    };
    let notifier = Arc::new(ConfirmationNotifier::new(mailer, config.branding.clone()));

    Ok(
        BookingService::new(store, build_calendar_client(config), &config.branding)
            .with_notifier(notifier),
    )
}
