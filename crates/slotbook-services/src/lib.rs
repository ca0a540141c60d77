//! Booking services: user persistence and the booking flow on top of the calendar layer.

pub mod booking;
pub mod error;
pub mod store;

pub use booking::{Availability, BookingRequest, BookingService, EventTypeRef, Profile};
pub use error::{BookingError, StoreError};
pub use store::{EventType, JsonFileStore, User, UserStore};
