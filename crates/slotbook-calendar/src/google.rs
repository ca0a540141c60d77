//! Google Calendar adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use slotbook_auth::{GoogleOAuth2Provider, GoogleTokenSet, TokenRefresh};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{handle_response, CalendarError};
use crate::provider::{CalendarProvider, ProviderFactory, ProviderResponse};
use crate::types::{BusyInterval, CalendarEvent, Credential, ProviderEvent, GOOGLE_CALENDAR};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const PRIMARY_CALENDAR: &str = "primary";
const CONFERENCE_REQUEST_ID_LEN: usize = 7;
const REMINDER_MINUTES: u32 = 60;

/// App-level settings shared by every Google adapter.
#[derive(Clone)]
pub struct GoogleCalendarSettings {
    pub oauth: Arc<GoogleOAuth2Provider>,
    pub api_base: String,
    pub http: reqwest::Client,
}

impl GoogleCalendarSettings {
    pub fn new(oauth: Arc<GoogleOAuth2Provider>) -> Self {
        Self {
            oauth,
            api_base: CALENDAR_API_BASE.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

pub struct GoogleCalendarAdapter {
    settings: GoogleCalendarSettings,
    tokens: Mutex<GoogleTokenSet>,
}

impl GoogleCalendarAdapter {
    pub fn new(settings: GoogleCalendarSettings, tokens: GoogleTokenSet) -> Self {
        Self {
            settings,
            tokens: Mutex::new(tokens),
        }
    }

    pub fn from_credential(
        settings: GoogleCalendarSettings,
        credential: &Credential,
    ) -> Result<Self, CalendarError> {
        let tokens: GoogleTokenSet = serde_json::from_value(credential.key.clone())
            .map_err(|e| CalendarError::invalid_credential(GOOGLE_CALENDAR, e))?;
        Ok(Self::new(settings, tokens))
    }

    pub fn factory(settings: GoogleCalendarSettings) -> ProviderFactory {
        Arc::new(move |credential: &Credential| {
            let adapter = Self::from_credential(settings.clone(), credential)?;
            Ok(Box::new(adapter) as Box<dyn CalendarProvider>)
        })
    }

    /// Current in-memory token state, including any refresh applied by this adapter.
    pub async fn token_set(&self) -> GoogleTokenSet {
        self.tokens.lock().await.clone()
    }

    /// Access token to use, refreshing first when it is missing, about to expire
    /// or `force` is set. Without a refresh token the stored access token is used as-is.
    async fn access_token(&self, force: bool) -> Result<(String, Option<TokenRefresh>), CalendarError> {
        let mut tokens = self.tokens.lock().await;
        let now_ms = chrono::Utc::now().timestamp_millis();

        if (force || tokens.needs_refresh(now_ms)) && tokens.refresh_token.is_some() {
            let refresh = self.settings.oauth.refresh(&tokens).await?;
            tokens.apply(&refresh);
            tracing::debug!("Refreshed Google access token");
            return Ok((tokens.access_token.clone(), Some(refresh)));
        }

        Ok((tokens.access_token.clone(), None))
    }

    /// Send an authorized request. A 401 triggers one forced refresh and a retry.
    async fn send_authorized<T, F>(&self, build: F) -> Result<ProviderResponse<T>, CalendarError>
    where
        T: DeserializeOwned + Send,
        F: Fn(&str) -> reqwest::RequestBuilder + Send + Sync,
    {
        let (token, refreshed) = self.access_token(false).await?;
        let can_retry = refreshed.is_none() && self.tokens.lock().await.refresh_token.is_some();

        let response = build(&token).send().await?;
        match handle_response::<T>(response).await {
            Err(CalendarError::TokenExpired) if can_retry => {
                tracing::info!("Google rejected the access token, refreshing and retrying");
                let (token, refreshed) = self.access_token(true).await?;
                let response = build(&token).send().await?;
                let data = handle_response(response).await?;
                Ok(ProviderResponse::new(data, refreshed))
            }
            Ok(data) => Ok(ProviderResponse::new(data, refreshed)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarAdapter {
    fn kind(&self) -> &str {
        GOOGLE_CALENDAR
    }

    #[instrument(skip(self), level = "info")]
    async fn get_availability(
        &self,
        date_from: &str,
        date_to: &str,
    ) -> Result<ProviderResponse<Vec<BusyInterval>>, CalendarError> {
        let url = format!("{}/freeBusy", self.settings.api_base);
        let body = FreeBusyRequest {
            time_min: date_from,
            time_max: date_to,
            items: vec![FreeBusyItem {
                id: PRIMARY_CALENDAR,
            }],
        };

        let response: ProviderResponse<FreeBusyResponse> = self
            .send_authorized(|token| self.settings.http.post(&url).bearer_auth(token).json(&body))
            .await
            .map_err(|e| {
                tracing::warn!("Google free/busy query failed: {}", e);
                e
            })?;

        let busy = primary_busy(response.data)?;
        Ok(ProviderResponse::new(busy, response.token_refresh))
    }

    #[instrument(skip(self, event), fields(title = %event.title), level = "info")]
    async fn create_event(
        &self,
        event: &CalendarEvent,
    ) -> Result<ProviderResponse<ProviderEvent>, CalendarError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.settings.api_base, PRIMARY_CALENDAR
        );
        let payload = translate_event(event, &conference_request_id());

        let response: ProviderResponse<serde_json::Value> = self
            .send_authorized(|token| {
                self.settings
                    .http
                    .post(&url)
                    .query(&[("conferenceDataVersion", "1")])
                    .bearer_auth(token)
                    .json(&payload)
            })
            .await
            .map_err(|e| {
                tracing::error!("There was an error contacting the Calendar service: {}", e);
                e
            })?;

        Ok(ProviderResponse::new(
            provider_event(response.data),
            response.token_refresh,
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: &'a str,
    time_max: &'a str,
    items: Vec<FreeBusyItem<'a>>,
}

#[derive(Debug, Serialize)]
struct FreeBusyItem<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyInterval>,
    #[serde(default)]
    errors: Vec<FreeBusyError>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyError {
    reason: Option<String>,
}

fn primary_busy(mut response: FreeBusyResponse) -> Result<Vec<BusyInterval>, CalendarError> {
    let primary = response
        .calendars
        .remove(PRIMARY_CALENDAR)
        .ok_or_else(|| CalendarError::InvalidResponse("primary calendar missing".into()))?;

    if let Some(err) = primary.errors.first() {
        return Err(CalendarError::InvalidResponse(format!(
            "free/busy error: {}",
            err.reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(primary.busy)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: EventDateTime<'a>,
    end: EventDateTime<'a>,
    attendees: Vec<EventAttendee<'a>>,
    reminders: Reminders,
    conference_data: ConferenceData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime<'a> {
    date_time: &'a str,
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventAttendee<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Reminders {
    use_default: bool,
    overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Serialize)]
struct ReminderOverride {
    method: &'static str,
    minutes: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    create_request: ConferenceCreateRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceCreateRequest {
    conference_solution_key: ConferenceSolutionKey,
    request_id: String,
}

#[derive(Debug, Serialize)]
struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Translate an event into the Google `events.insert` payload with a Meet conference request.
pub fn translate_event(event: &CalendarEvent, request_id: &str) -> serde_json::Value {
    let payload = EventPayload {
        summary: &event.title,
        description: event.description.as_deref(),
        start: EventDateTime {
            date_time: &event.start_time,
            time_zone: &event.time_zone,
        },
        end: EventDateTime {
            date_time: &event.end_time,
            time_zone: &event.time_zone,
        },
        attendees: event
            .attendees
            .iter()
            .map(|a| EventAttendee {
                email: &a.email,
                display_name: a.name.as_deref(),
            })
            .collect(),
        reminders: Reminders {
            use_default: false,
            overrides: vec![ReminderOverride {
                method: "email",
                minutes: REMINDER_MINUTES,
            }],
        },
        conference_data: ConferenceData {
            create_request: ConferenceCreateRequest {
                conference_solution_key: ConferenceSolutionKey {
                    kind: "hangoutsMeet",
                },
                request_id: request_id.to_string(),
            },
        },
    };

    serde_json::to_value(payload).unwrap_or_default()
}

/// Random alphanumeric id scoping a conference create request to one API call.
pub fn conference_request_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONFERENCE_REQUEST_ID_LEN)
        .map(char::from)
        .collect()
}

fn provider_event(raw: serde_json::Value) -> ProviderEvent {
    let text = |v: &serde_json::Value| v.as_str().map(str::to_string);

    let meeting_link = text(&raw["hangoutLink"]).or_else(|| {
        raw["conferenceData"]["entryPoints"]
            .as_array()
            .and_then(|points| {
                points
                    .iter()
                    .find(|p| p["entryPointType"] == "video")
                    .and_then(|p| text(&p["uri"]))
            })
    });

    ProviderEvent {
        kind: GOOGLE_CALENDAR.to_string(),
        id: text(&raw["id"]),
        start: text(&raw["start"]["dateTime"]).or_else(|| text(&raw["start"]["date"])),
        meeting_link,
        html_link: text(&raw["htmlLink"]),
        raw,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::types::{Attendee, Organizer};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> GoogleCalendarSettings {
        let oauth = GoogleOAuth2Provider::new(
            "client".to_string(),
            "secret".to_string(),
        )
        .with_token_url(format!("{}/token", server.uri()));
        GoogleCalendarSettings::new(Arc::new(oauth)).with_api_base(server.uri())
    }

    fn tokens(access_token: &str, expiry_offset_ms: i64) -> GoogleTokenSet {
        GoogleTokenSet {
            access_token: access_token.to_string(),
            refresh_token: Some("google-rt".to_string()),
            expiry_date: Some(chrono::Utc::now().timestamp_millis() + expiry_offset_ms),
            scope: None,
            token_type: Some("Bearer".to_string()),
            id_token: None,
        }
    }

    fn booking() -> CalendarEvent {
        CalendarEvent {
            title: "Acme - Intro call".to_string(),
            start_time: "2024-01-01T10:00:00-05:00".to_string(),
            end_time: "2024-01-01T10:30:00-05:00".to_string(),
            time_zone: "America/New_York".to_string(),
            description: Some("Intro".to_string()),
            organizer: Organizer {
                name: Some("Host".to_string()),
                email: Some("host@acme.test".to_string()),
                picture: None,
            },
            attendees: vec![Attendee {
                name: Some("A".to_string()),
                email: "a@x.com".to_string(),
            }],
        }
    }

    async fn mount_freebusy(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .and(header("Authorization", format!("Bearer {}", token).as_str()))
            .and(body_partial_json(serde_json::json!({"items": [{"id": "primary"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "calendar#freeBusy",
                "calendars": {
                    "primary": {
                        "busy": [
                            {"start": "2024-01-01T10:00:00Z", "end": "2024-01-01T10:30:00Z"}
                        ]
                    }
                }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_availability_returns_primary_busy_unmodified() {
        let server = MockServer::start().await;
        mount_freebusy(&server, "valid").await;

        let adapter = GoogleCalendarAdapter::new(settings(&server), tokens("valid", 3_600_000));
        let response = adapter
            .get_availability("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
            .await
            .unwrap();

        assert_eq!(
            response.data,
            vec![BusyInterval {
                start: "2024-01-01T10:00:00Z".to_string(),
                end: "2024-01-01T10:30:00Z".to_string(),
            }]
        );
        assert!(response.token_refresh.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_freebusy(&server, "fresh").await;

        let adapter = GoogleCalendarAdapter::new(settings(&server), tokens("stale", -1000));
        let response = adapter
            .get_availability("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
            .await
            .unwrap();

        assert_eq!(response.data.len(), 1);
        let refresh = response.token_refresh.unwrap();
        assert_eq!(refresh.access_token, "fresh");
        assert_eq!(adapter.token_set().await.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_unauthorized_triggers_single_refresh_and_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .and(header("Authorization", "Bearer revoked"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_freebusy(&server, "fresh").await;

        let adapter = GoogleCalendarAdapter::new(settings(&server), tokens("revoked", 3_600_000));
        let response = adapter
            .get_availability("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
            .await
            .unwrap();

        assert_eq!(response.data.len(), 1);
        assert!(response.token_refresh.is_some());
    }

    #[tokio::test]
    async fn test_freebusy_calendar_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "calendars": {
                    "primary": {"errors": [{"domain": "global", "reason": "notFound"}]}
                }
            })))
            .mount(&server)
            .await;

        let adapter = GoogleCalendarAdapter::new(settings(&server), tokens("valid", 3_600_000));
        let result = adapter.get_availability("a", "b").await;

        match result {
            Err(CalendarError::InvalidResponse(msg)) => assert!(msg.contains("notFound")),
            other => panic!("unexpected result: {:?}", other.map(|r| r.data)),
        }
    }

    #[tokio::test]
    async fn test_create_event_requests_meet_conference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(query_param("conferenceDataVersion", "1"))
            .and(body_partial_json(serde_json::json!({
                "summary": "Acme - Intro call",
                "start": {"dateTime": "2024-01-01T10:00:00-05:00", "timeZone": "America/New_York"},
                "attendees": [{"email": "a@x.com", "displayName": "A"}],
                "reminders": {"useDefault": false, "overrides": [{"method": "email", "minutes": 60}]},
                "conferenceData": {"createRequest": {"conferenceSolutionKey": {"type": "hangoutsMeet"}}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "evt123",
                "htmlLink": "https://www.google.com/calendar/event?eid=evt123",
                "hangoutLink": "https://meet.google.com/abc-defg-hij",
                "start": {"dateTime": "2024-01-01T10:00:00-05:00", "timeZone": "America/New_York"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GoogleCalendarAdapter::new(settings(&server), tokens("valid", 3_600_000));
        let created = adapter.create_event(&booking()).await.unwrap().data;

        assert_eq!(created.kind, GOOGLE_CALENDAR);
        assert_eq!(created.id.as_deref(), Some("evt123"));
        assert_eq!(
            created.meeting_link.as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
        assert_eq!(created.raw["id"], "evt123");
    }

    #[tokio::test]
    async fn test_create_event_failure_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid attendee"))
            .mount(&server)
            .await;

        let adapter = GoogleCalendarAdapter::new(settings(&server), tokens("valid", 3_600_000));
        let result = adapter.create_event(&booking()).await;

        assert!(matches!(
            result,
            Err(CalendarError::ApiError { status: 400, .. })
        ));
    }

    #[test]
    fn test_translate_event_omits_missing_description() {
        let mut event = booking();
        event.description = None;
        let payload = translate_event(&event, "abc1234");

        assert!(payload.get("description").is_none());
        assert_eq!(payload["conferenceData"]["createRequest"]["requestId"], "abc1234");
        assert_eq!(payload["end"]["timeZone"], "America/New_York");
    }

    #[test]
    fn test_conference_request_id_shape() {
        let id = conference_request_id();
        assert_eq!(id.len(), CONFERENCE_REQUEST_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_meeting_link_from_entry_points() {
        let created = provider_event(serde_json::json!({
            "id": "x",
            "start": {"date": "2024-01-01"},
            "conferenceData": {"entryPoints": [
                {"entryPointType": "phone", "uri": "tel:+1"},
                {"entryPointType": "video", "uri": "https://meet.google.com/xyz"}
            ]}
        }));
        assert_eq!(created.meeting_link.as_deref(), Some("https://meet.google.com/xyz"));
        assert_eq!(created.start.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let credential = Credential::new(1, GOOGLE_CALENDAR, serde_json::json!("not an object"));
        let oauth = GoogleOAuth2Provider::new(String::new(), String::new());
        let result =
            GoogleCalendarAdapter::from_credential(GoogleCalendarSettings::new(Arc::new(oauth)), &credential);
        assert!(matches!(result, Err(CalendarError::InvalidCredential { .. })));
    }
}
