//! Confirmation email rendering.

use askama::Template;
use slotbook_calendar::BookingNotice;
use slotbook_core::BrandingConfig;

use crate::error::NotifyError;

pub const CONFIRMATION_SUBJECT: &str = "You booked a call with us!";

/// A rendered email ready for a [`Mailer`](crate::Mailer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Template)]
#[template(path = "confirmation.html")]
struct ConfirmationHtml<'a> {
    subject: &'a str,
    organizer: &'a str,
    start: &'a str,
    avatar: Option<&'a str>,
    meeting_link: Option<&'a str>,
    company_name: &'a str,
    website: &'a str,
}

/// Render the confirmation for a booking notice.
///
/// The organizer falls back to the company name when the host has no display name.
pub fn render_confirmation(
    notice: &BookingNotice,
    branding: &BrandingConfig,
) -> Result<OutgoingEmail, NotifyError> {
    let organizer = notice
        .organizer_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&branding.company_name);

    let mut text = format!(
        "You booked a call with {}. Meeting date: {}.",
        organizer, notice.start
    );
    if let Some(link) = &notice.meeting_link {
        text.push_str(&format!(" Meeting link: {}", link));
    }

    let html = ConfirmationHtml {
        subject: CONFIRMATION_SUBJECT,
        organizer,
        start: &notice.start,
        avatar: notice.organizer_avatar.as_deref(),
        meeting_link: notice.meeting_link.as_deref(),
        company_name: &branding.company_name,
        website: &branding.website,
    }
    .render()?;

    Ok(OutgoingEmail {
        to: notice.recipients.clone(),
        subject: CONFIRMATION_SUBJECT.to_string(),
        text,
        html,
    })
}
