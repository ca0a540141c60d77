//! Booking flow: turns a visitor's booking request into an event on the host's calendar.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotbook_calendar::{
    Attendee, BusyInterval, CalendarClient, CalendarEvent, CredentialRefresh, Organizer,
    ProviderEvent, ProviderFailure,
};
use slotbook_core::BrandingConfig;
use slotbook_notify::{validate_address, ConfirmationNotifier};
use tracing::instrument;

use crate::error::BookingError;
use crate::store::{EventType, User, UserStore};

/// Booking submitted from the public booking page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub start: String,
    pub end: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub event_type: EventTypeRef,
}

/// The event type as the booking page sent it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl BookingRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.start.trim().is_empty() || self.end.trim().is_empty() {
            return Err(BookingError::InvalidRequest(
                "Booking start and end are required.".into(),
            ));
        }
        if validate_address(&self.email).is_err() {
            return Err(BookingError::InvalidRequest(
                "A valid email address is required.".into(),
            ));
        }
        if self.event_type.title.trim().is_empty() {
            return Err(BookingError::InvalidRequest(
                "The event type is missing a title.".into(),
            ));
        }
        Ok(())
    }
}

/// Merged busy intervals plus the calendars that could not be queried.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub busy: Vec<BusyInterval>,
    pub failures: Vec<ProviderFailure>,
}

/// Public booking page data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub event_types: Vec<EventType>,
}

pub struct BookingService {
    store: Arc<dyn UserStore>,
    calendar: CalendarClient,
    notifier: Option<Arc<ConfirmationNotifier>>,
    title_prefix: String,
}

impl BookingService {
    pub fn new(store: Arc<dyn UserStore>, calendar: CalendarClient, branding: &BrandingConfig) -> Self {
        Self {
            store,
            calendar,
            notifier: None,
            title_prefix: branding.event_title_prefix.trim().to_string(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<ConfirmationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Event to create on `host`'s calendar for a booking request.
    pub fn build_event(&self, host: &User, request: &BookingRequest) -> CalendarEvent {
        let title = if self.title_prefix.is_empty() {
            request.event_type.title.clone()
        } else {
            format!("{} - {}", self.title_prefix, request.event_type.title)
        };

        CalendarEvent {
            title,
            start_time: request.start.clone(),
            end_time: request.end.clone(),
            time_zone: host.time_zone.clone(),
            description: describe(
                request.event_type.description.as_deref(),
                request.notes.as_deref(),
            ),
            organizer: Organizer {
                name: Some(host.display_name().to_string()),
                email: host.email.clone(),
                picture: host.avatar.clone(),
            },
            attendees: vec![Attendee {
                name: Some(request.name.clone()).filter(|n| !n.trim().is_empty()),
                email: request.email.trim().to_string(),
            }],
        }
    }

    /// Book a call with `username`, creating the event on their first connected calendar.
    #[instrument(skip(self, request), level = "info")]
    pub async fn book(
        &self,
        username: &str,
        request: &BookingRequest,
    ) -> Result<ProviderEvent, BookingError> {
        request.validate()?;
        let host = self.store.find_user(username)?;

        let credential = host
            .credentials
            .first()
            .ok_or_else(|| BookingError::NoCalendarConnected(username.to_string()))?;

        let event = self.build_event(&host, request);
        let created = self.calendar.create_event(credential, &event).await?;

        if let Some(refresh) = &created.token_refresh {
            self.persist_refresh(username, refresh);
        }

        match (&self.notifier, created.notice) {
            (Some(notifier), Some(notice)) => {
                notifier.dispatch(notice);
            }
            (None, Some(_)) => tracing::debug!("No notifier configured, skipping confirmation"),
            (_, None) => {}
        }

        tracing::info!(
            kind = %created.event.kind,
            event_id = created.event.id.as_deref().unwrap_or("-"),
            "Booking created"
        );
        Ok(created.event)
    }

    /// Busy intervals across all of the user's calendars.
    #[instrument(skip(self), level = "info")]
    pub async fn busy_times(
        &self,
        username: &str,
        date_from: &str,
        date_to: &str,
    ) -> Result<Availability, BookingError> {
        let host = self.store.find_user(username)?;
        let busy = self
            .calendar
            .get_busy_times(&host.credentials, date_from, date_to)
            .await;

        for refresh in &busy.token_refreshes {
            self.persist_refresh(username, refresh);
        }

        Ok(Availability {
            busy: busy.intervals,
            failures: busy.failures,
        })
    }

    pub fn profile(&self, username: &str) -> Result<Profile, BookingError> {
        let user = self.store.find_user(username)?;

        Ok(Profile {
            username: user.username.clone(),
            name: user.display_name().to_string(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            event_types: user
                .event_types
                .into_iter()
                .filter(|t| !t.hidden)
                .collect(),
        })
    }

    fn persist_refresh(&self, username: &str, refresh: &CredentialRefresh) {
        if let Err(e) = self.store.apply_token_refresh(username, refresh) {
            tracing::error!(
                credential_id = refresh.credential_id,
                "Failed to persist refreshed token: {}",
                e
            );
        }
    }
}

fn describe(description: Option<&str>, notes: Option<&str>) -> Option<String> {
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());

    match (description, notes) {
        (Some(d), Some(n)) => Some(format!("{}\n\nRequester additional notes: {}", d, n)),
        (Some(d), None) => Some(d.to_string()),
        (None, Some(n)) => Some(format!("Requester additional notes: {}", n)),
        (None, None) => None,
    }
}
