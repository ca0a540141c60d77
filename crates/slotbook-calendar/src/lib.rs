//! Calendar provider integration for booking pages.
//!
//! Unifies Google Calendar and Microsoft 365 behind [`CalendarProvider`], fans
//! availability queries out across a user's connected calendars and dispatches
//! event creation to a single credential's provider.

pub mod aggregate;
pub mod error;
pub mod google;
pub mod microsoft;
pub mod provider;
pub mod types;

pub use aggregate::{BusyTimes, CalendarClient, CreatedEvent, CredentialRefresh, ProviderFailure};
pub use error::CalendarError;
pub use google::{GoogleCalendarAdapter, GoogleCalendarSettings};
pub use microsoft::{MicrosoftGraphAdapter, MicrosoftGraphSettings};
pub use provider::{CalendarProvider, ProviderFactory, ProviderRegistry, ProviderResponse};
pub use types::{
    Attendee, BookingNotice, BusyInterval, CalendarEvent, Credential, Organizer, ProviderEvent,
    GOOGLE_CALENDAR, OFFICE365_CALENDAR,
};
