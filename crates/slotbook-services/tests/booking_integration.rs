//! Integration tests for BookingService over a JSON store and mocked calendar APIs.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use slotbook_auth::{GoogleOAuth2Provider, MicrosoftOAuth2Provider};
use slotbook_calendar::{
    CalendarClient, CalendarError, GoogleCalendarSettings, MicrosoftGraphSettings,
};
use slotbook_core::BrandingConfig;
use slotbook_notify::{ConfirmationNotifier, Mailer, NotifyError, OutgoingEmail};
use slotbook_services::{
    BookingError, BookingRequest, BookingService, EventTypeRef, JsonFileStore, UserStore,
};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    path: PathBuf,
    store: Arc<JsonFileStore>,
    mailer: Arc<RecordingMailer>,
    service: BookingService,
}

fn harness(server: &MockServer, users: serde_json::Value) -> Harness {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.json");
    std::fs::write(&path, users.to_string()).unwrap();
    let store = Arc::new(JsonFileStore::open(&path).unwrap());

    let google = GoogleOAuth2Provider::new(
        "google-client".to_string(),
        "google-secret".to_string(),
    )
    .with_token_url(format!("{}/google/token", server.uri()));
    let microsoft = MicrosoftOAuth2Provider::new("ms-client".to_string(), "ms-secret".to_string())
        .with_token_url(format!("{}/ms/token", server.uri()));
    let calendar = CalendarClient::with_defaults(
        GoogleCalendarSettings::new(Arc::new(google))
            .with_api_base(format!("{}/google", server.uri())),
        MicrosoftGraphSettings::new(Arc::new(microsoft))
            .with_graph_base(format!("{}/graph", server.uri())),
    );

    let branding = BrandingConfig {
        company_name: "Acme".to_string(),
        website: "https://acme.test".to_string(),
        event_title_prefix: "Acme".to_string(),
    };
    let mailer = Arc::new(RecordingMailer::default());
    let notifier = Arc::new(ConfirmationNotifier::new(mailer.clone(), branding.clone()));

    let service = BookingService::new(store.clone(), calendar, &branding).with_notifier(notifier);

    Harness {
        _dir: dir,
        path,
        store,
        mailer,
        service,
    }
}

fn user_document(credentials: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "users": [{
            "id": 1,
            "username": "dana",
            "name": "Dana",
            "email": "dana@acme.test",
            "avatar": "https://cdn.test/dana.png",
            "timeZone": "America/New_York",
            "credentials": credentials,
            "eventTypes": [
                {"id": 1, "title": "Intro call", "length": 30},
                {"id": 2, "title": "Internal", "length": 60, "hidden": true}
            ]
        }]
    })
}

fn request() -> BookingRequest {
    BookingRequest {
        start: "2024-01-01T10:00:00-05:00".to_string(),
        end: "2024-01-01T10:30:00-05:00".to_string(),
        name: "Alex".to_string(),
        email: "alex@x.com".to_string(),
        notes: None,
        event_type: EventTypeRef {
            id: Some(1),
            title: "Intro call".to_string(),
            description: Some("A short intro".to_string()),
            length: Some(30),
        },
    }
}

async fn wait_for_mail(mailer: &RecordingMailer) -> Vec<OutgoingEmail> {
    for _ in 0..50 {
        {
            let sent = mailer.sent.lock();
            if !sent.is_empty() {
                return sent.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Vec::new()
}

#[tokio::test]
async fn test_book_on_google_sends_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google/calendars/primary/events"))
        .and(body_partial_json(serde_json::json!({
            "summary": "Acme - Intro call",
            "start": {"timeZone": "America/New_York"},
            "attendees": [{"email": "alex@x.com", "displayName": "Alex"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "evt1",
            "hangoutLink": "https://meet.google.com/abc-defg-hij",
            "start": {"dateTime": "2024-01-01T10:00:00-05:00"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(
        &server,
        user_document(serde_json::json!([{
            "id": 1,
            "type": "google_calendar",
            "key": {
                "access_token": "g-token",
                "refresh_token": "g-rt",
                "expiry_date": chrono::Utc::now().timestamp_millis() + 3_600_000
            }
        }])),
    );

    let event = h.service.book("dana", &request()).await.unwrap();
    assert_eq!(event.id.as_deref(), Some("evt1"));
    assert_eq!(event.raw["hangoutLink"], "https://meet.google.com/abc-defg-hij");

    let sent = wait_for_mail(&h.mailer).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["alex@x.com"]);
    assert!(sent[0].text.contains("https://meet.google.com/abc-defg-hij"));
    assert!(sent[0].text.contains("Dana"));
}

#[tokio::test]
async fn test_book_refreshes_and_persists_microsoft_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ms/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ms-fresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graph/me/calendar/events"))
        .and(header("Authorization", "Bearer ms-fresh"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "AAMk",
            "start": {"dateTime": "2024-01-01T15:00:00.0000000", "timeZone": "UTC"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(
        &server,
        user_document(serde_json::json!([{
            "id": 7,
            "type": "office365_calendar",
            "key": {
                "access_token": "ms-stale",
                "refresh_token": "ms-rt",
                "expiry_date": 1,
                "email": "dana@contoso.test"
            }
        }])),
    );

    let event = h.service.book("dana", &request()).await.unwrap();
    assert_eq!(event.id.as_deref(), Some("AAMk"));

    let stored = h.store.find_user("dana").unwrap();
    assert_eq!(stored.credentials[0].key["access_token"], "ms-fresh");
    assert!(stored.credentials[0].key["expiry_date"].as_i64().unwrap() > 1);

    let reopened = JsonFileStore::open(&h.path).unwrap();
    assert_eq!(
        reopened.find_user("dana").unwrap().credentials[0].key["access_token"],
        "ms-fresh"
    );

    assert_eq!(wait_for_mail(&h.mailer).await.len(), 1);
}

#[tokio::test]
async fn test_book_without_calendar() {
    let server = MockServer::start().await;
    let h = harness(&server, user_document(serde_json::json!([])));

    let result = h.service.book("dana", &request()).await;
    assert!(matches!(result, Err(BookingError::NoCalendarConnected(_))));
}

#[tokio::test]
async fn test_book_with_unsupported_calendar() {
    let server = MockServer::start().await;
    let h = harness(
        &server,
        user_document(serde_json::json!([{"id": 3, "type": "caldav", "key": {}}])),
    );

    let result = h.service.book("dana", &request()).await;
    assert!(matches!(
        result,
        Err(BookingError::Calendar(CalendarError::NoAdapter(_)))
    ));
}

#[tokio::test]
async fn test_busy_times_reports_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google/freeBusy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "calendars": {"primary": {"busy": [
                {"start": "2024-01-01T15:00:00Z", "end": "2024-01-01T15:30:00Z"}
            ]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graph/me/calendar/getSchedule"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .mount(&server)
        .await;

    let h = harness(
        &server,
        user_document(serde_json::json!([
            {"id": 1, "type": "google_calendar", "key": {
                "access_token": "g-token",
                "expiry_date": chrono::Utc::now().timestamp_millis() + 3_600_000
            }},
            {"id": 2, "type": "office365_calendar", "key": {
                "access_token": "ms-token",
                "refresh_token": "ms-rt",
                "expiry_date": chrono::Utc::now().timestamp() + 3600,
                "email": "dana@contoso.test"
            }}
        ])),
    );

    let availability = h
        .service
        .busy_times("dana", "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
        .await
        .unwrap();

    assert_eq!(availability.busy.len(), 1);
    assert_eq!(availability.failures.len(), 1);
    assert_eq!(availability.failures[0].credential_id, 2);
}

#[tokio::test]
async fn test_profile_hides_hidden_event_types() {
    let server = MockServer::start().await;
    let h = harness(&server, user_document(serde_json::json!([])));

    let profile = h.service.profile("dana").unwrap();
    assert_eq!(profile.name, "Dana");
    assert_eq!(profile.event_types.len(), 1);
    assert_eq!(profile.event_types[0].title, "Intro call");
}
