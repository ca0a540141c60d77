//! Provider contract and the credential-type registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use slotbook_auth::TokenRefresh;

use crate::error::CalendarError;
use crate::types::{BusyInterval, CalendarEvent, Credential, ProviderEvent};

/// Result of a provider call plus the token refresh performed to authorize it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse<T> {
    pub data: T,
    pub token_refresh: Option<TokenRefresh>,
}

impl<T> ProviderResponse<T> {
    pub fn new(data: T, token_refresh: Option<TokenRefresh>) -> Self {
        Self {
            data,
            token_refresh,
        }
    }
}

/// Availability and event creation against one connected calendar.
///
/// One instance is built per credential. All state beyond the credential's
/// token set lives with the caller.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Credential type tag this provider serves
    fn kind(&self) -> &str;

    /// Busy intervals in `[date_from, date_to)`.
    async fn get_availability(
        &self,
        date_from: &str,
        date_to: &str,
    ) -> Result<ProviderResponse<Vec<BusyInterval>>, CalendarError>;

    async fn create_event(
        &self,
        event: &CalendarEvent,
    ) -> Result<ProviderResponse<ProviderEvent>, CalendarError>;
}

/// Constructor for a provider from a stored credential.
pub type ProviderFactory =
    Arc<dyn Fn(&Credential) -> Result<Box<dyn CalendarProvider>, CalendarError> + Send + Sync>;

/// Maps credential type tags to provider constructors.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Credential) -> Result<Box<dyn CalendarProvider>, CalendarError>
            + Send
            + Sync
            + 'static,
    {
        let kind = kind.into();
        tracing::debug!("Registering calendar provider: {}", kind);
        self.factories.insert(kind, Arc::new(factory));
        self
    }

    /// Builder form of [`register`](Self::register) for an already shared factory.
    pub fn with(mut self, kind: impl Into<String>, factory: ProviderFactory) -> Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build the provider for a credential. `None` when the type is not registered.
    pub fn build(
        &self,
        credential: &Credential,
    ) -> Option<Result<Box<dyn CalendarProvider>, CalendarError>> {
        self.factories
            .get(&credential.kind)
            .map(|factory| factory(credential))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
