//! Calendar integration types and data structures.

use serde::{Deserialize, Serialize};
use slotbook_auth::TokenRefresh;

/// Credential type tag for Google Calendar accounts.
pub const GOOGLE_CALENDAR: &str = "google_calendar";

/// Credential type tag for Microsoft 365 accounts.
pub const OFFICE365_CALENDAR: &str = "office365_calendar";

/// A stored authorization record binding a user to one external calendar account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    #[serde(default)]
    pub id: i64,

    /// Credential type tag, e.g. `google_calendar`
    #[serde(rename = "type")]
    pub kind: String,

    /// Provider-specific OAuth state, opaque to the persistence layer
    pub key: serde_json::Value,
}

impl Credential {
    pub fn new(id: i64, kind: impl Into<String>, key: serde_json::Value) -> Self {
        Self {
            id,
            kind: kind.into(),
            key,
        }
    }

    /// Patch refreshed token state into the key blob, keeping any other fields.
    pub fn apply_refresh(&mut self, refresh: &TokenRefresh) {
        if !self.key.is_object() {
            self.key = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(key) = self.key.as_object_mut() {
            key.insert(
                "access_token".to_string(),
                serde_json::Value::String(refresh.access_token.clone()),
            );
            key.insert(
                "expiry_date".to_string(),
                serde_json::Value::from(refresh.expiry_date),
            );
            if let Some(rt) = &refresh.refresh_token {
                key.insert(
                    "refresh_token".to_string(),
                    serde_json::Value::String(rt.clone()),
                );
            }
        }
    }
}

/// Event to create on the host's calendar.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub time_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub organizer: Organizer,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Organizer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attendee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

/// Time already occupied on a calendar, as ISO 8601 timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: String,
    pub end: String,
}

/// Event as created by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderEvent {
    /// Credential type tag of the provider that created it
    pub kind: String,
    pub id: Option<String>,
    pub start: Option<String>,
    /// Video meeting join link, when the provider attached one
    pub meeting_link: Option<String>,
    pub html_link: Option<String>,
    /// Provider payload as returned by the API
    pub raw: serde_json::Value,
}

/// Side-effect description: an event was created and these attendees should be told.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingNotice {
    pub recipients: Vec<String>,
    pub title: String,
    pub start: String,
    pub time_zone: String,
    pub meeting_link: Option<String>,
    pub organizer_name: Option<String>,
    pub organizer_avatar: Option<String>,
}

impl BookingNotice {
    /// Build the notice for a created event. Returns `None` when nobody is to be notified.
    pub fn for_created(event: &CalendarEvent, created: &ProviderEvent) -> Option<Self> {
        let recipients: Vec<String> = event
            .attendees
            .iter()
            .map(|a| a.email.trim().to_string())
            .filter(|email| !email.is_empty())
            .collect();

        if recipients.is_empty() {
            return None;
        }

        Some(Self {
            recipients,
            title: event.title.clone(),
            start: created
                .start
                .clone()
                .unwrap_or_else(|| event.start_time.clone()),
            time_zone: event.time_zone.clone(),
            meeting_link: created.meeting_link.clone(),
            organizer_name: event.organizer.name.clone(),
            organizer_avatar: event.organizer.picture.clone(),
        })
    }
}
