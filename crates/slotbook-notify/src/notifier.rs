//! Fire-and-forget booking confirmations.

use std::sync::Arc;

use slotbook_calendar::BookingNotice;
use slotbook_core::BrandingConfig;
use tokio::task::JoinHandle;

use crate::error::NotifyError;
use crate::mailer::Mailer;
use crate::template::render_confirmation;

pub struct ConfirmationNotifier {
    mailer: Arc<dyn Mailer>,
    branding: BrandingConfig,
}

impl ConfirmationNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, branding: BrandingConfig) -> Self {
        Self { mailer, branding }
    }

    /// Render and send the confirmation for a notice.
    pub async fn notify(&self, notice: &BookingNotice) -> Result<(), NotifyError> {
        let email = render_confirmation(notice, &self.branding)?;
        self.mailer.send(&email).await
    }

    /// Send in the background. Failures are logged and never surfaced to the booking.
    pub fn dispatch(self: &Arc<Self>, notice: BookingNotice) -> JoinHandle<()> {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            match notifier.notify(&notice).await {
                Ok(()) => tracing::info!(
                    recipients = notice.recipients.len(),
                    "Booking confirmation sent"
                ),
                Err(e) => tracing::error!(
                    transient = e.is_transient(),
                    "Failed to send booking confirmation: {}",
                    e
                ),
            }
        })
    }
}

impl std::fmt::Debug for ConfirmationNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationNotifier")
            .field("company", &self.branding.company_name)
            .finish()
    }
}
