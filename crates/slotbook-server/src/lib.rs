//! HTTP surface for booking pages.

pub mod app;
pub mod error;
pub mod routes;

pub use app::{build_calendar_client, build_service};
pub use routes::routes;
