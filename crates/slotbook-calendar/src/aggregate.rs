//! Fan-out over a user's connected calendars.

use futures::future::join_all;
use serde::Serialize;
use slotbook_auth::TokenRefresh;
use tracing::instrument;

use crate::error::CalendarError;
use crate::google::{GoogleCalendarAdapter, GoogleCalendarSettings};
use crate::microsoft::{MicrosoftGraphAdapter, MicrosoftGraphSettings};
use crate::provider::{CalendarProvider, ProviderRegistry};
use crate::types::{
    BookingNotice, BusyInterval, CalendarEvent, Credential, ProviderEvent, GOOGLE_CALENDAR,
    OFFICE365_CALENDAR,
};

/// A token refresh tied to the stored credential it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialRefresh {
    pub credential_id: i64,
    pub kind: String,
    pub refresh: TokenRefresh,
}

/// A calendar that could not answer an availability query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub credential_id: i64,
    pub kind: String,
    pub error: String,
}

/// Merged availability across calendars, in credential order.
#[derive(Debug, Default)]
pub struct BusyTimes {
    pub intervals: Vec<BusyInterval>,
    pub failures: Vec<ProviderFailure>,
    pub token_refreshes: Vec<CredentialRefresh>,
}

#[derive(Debug)]
pub struct CreatedEvent {
    pub event: ProviderEvent,
    pub token_refresh: Option<CredentialRefresh>,
    /// Confirmation to send, when the event has attendees
    pub notice: Option<BookingNotice>,
}

/// Entry point for calendar operations over stored credentials.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    registry: ProviderRegistry,
}

impl CalendarClient {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Client with the Google and Microsoft 365 providers registered.
    pub fn with_defaults(google: GoogleCalendarSettings, microsoft: MicrosoftGraphSettings) -> Self {
        let registry = ProviderRegistry::new()
            .with(GOOGLE_CALENDAR, GoogleCalendarAdapter::factory(google))
            .with(OFFICE365_CALENDAR, MicrosoftGraphAdapter::factory(microsoft));
        Self::new(registry)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Build one provider per credential, in order. Unrecognized types are skipped.
    pub fn build_adapters<'a>(
        &self,
        credentials: &'a [Credential],
    ) -> Vec<(&'a Credential, Result<Box<dyn CalendarProvider>, CalendarError>)> {
        credentials
            .iter()
            .filter_map(|credential| match self.registry.build(credential) {
                Some(built) => Some((credential, built)),
                None => {
                    tracing::debug!(
                        credential_id = credential.id,
                        kind = %credential.kind,
                        "Skipping credential without a calendar adapter"
                    );
                    None
                }
            })
            .collect()
    }

    /// Query every calendar concurrently and concatenate the busy intervals.
    ///
    /// A calendar that fails is left out of `intervals` and reported in `failures`;
    /// the others still contribute. No credentials yields an empty result.
    #[instrument(skip(self, credentials), fields(count = credentials.len()), level = "info")]
    pub async fn get_busy_times(
        &self,
        credentials: &[Credential],
        date_from: &str,
        date_to: &str,
    ) -> BusyTimes {
        let adapters = self.build_adapters(credentials);

        let queries = adapters.into_iter().map(|(credential, built)| async move {
            let result = match built {
                Ok(provider) => provider.get_availability(date_from, date_to).await,
                Err(e) => Err(e),
            };
            (credential, result)
        });

        let mut busy = BusyTimes::default();
        for (credential, result) in join_all(queries).await {
            match result {
                Ok(response) => {
                    busy.intervals.extend(response.data);
                    if let Some(refresh) = response.token_refresh {
                        busy.token_refreshes.push(CredentialRefresh {
                            credential_id: credential.id,
                            kind: credential.kind.clone(),
                            refresh,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        credential_id = credential.id,
                        kind = %credential.kind,
                        "Availability query failed: {}",
                        e
                    );
                    busy.failures.push(ProviderFailure {
                        credential_id: credential.id,
                        kind: credential.kind.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        busy
    }

    /// Create the event on the calendar behind one credential.
    #[instrument(skip(self, credential, event), fields(kind = %credential.kind), level = "info")]
    pub async fn create_event(
        &self,
        credential: &Credential,
        event: &CalendarEvent,
    ) -> Result<CreatedEvent, CalendarError> {
        let provider = self
            .registry
            .build(credential)
            .ok_or_else(|| CalendarError::NoAdapter(credential.kind.clone()))??;

        let response = provider.create_event(event).await?;
        let notice = BookingNotice::for_created(event, &response.data);

        Ok(CreatedEvent {
            token_refresh: response.token_refresh.map(|refresh| CredentialRefresh {
                credential_id: credential.id,
                kind: credential.kind.clone(),
                refresh,
            }),
            notice,
            event: response.data,
        })
    }
}
