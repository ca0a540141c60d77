//! Booking confirmation emails.

pub mod error;
pub mod mailer;
pub mod notifier;
pub mod template;

pub use error::NotifyError;
pub use mailer::{validate_address, LogMailer, Mailer, SmtpMailer};
pub use notifier::ConfirmationNotifier;
pub use template::{render_confirmation, OutgoingEmail, CONFIRMATION_SUBJECT};
