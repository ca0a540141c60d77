//! Microsoft 365 calendar adapter over Microsoft Graph.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slotbook_auth::{MicrosoftOAuth2Provider, MicrosoftTokenSet, TokenRefresh};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{handle_response, CalendarError};
use crate::provider::{CalendarProvider, ProviderFactory, ProviderResponse};
use crate::types::{BusyInterval, CalendarEvent, Credential, ProviderEvent, OFFICE365_CALENDAR};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Granularity of the availability view, in minutes.
const AVAILABILITY_VIEW_INTERVAL: u32 = 60;

#[derive(Clone)]
pub struct MicrosoftGraphSettings {
    pub oauth: Arc<MicrosoftOAuth2Provider>,
    pub graph_base: String,
    pub http: reqwest::Client,
}

impl MicrosoftGraphSettings {
    pub fn new(oauth: Arc<MicrosoftOAuth2Provider>) -> Self {
        Self {
            oauth,
            graph_base: GRAPH_API_BASE.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_graph_base(mut self, graph_base: impl Into<String>) -> Self {
        self.graph_base = graph_base.into().trim_end_matches('/').to_string();
        self
    }
}

/// Calendar provider for a single Microsoft 365 account.
///
/// Authorization is resolved per call: a stored token whose expiry has passed
/// is refreshed exactly once before the request is sent. There is no retry on 401.
pub struct MicrosoftGraphAdapter {
    settings: MicrosoftGraphSettings,
    tokens: Mutex<MicrosoftTokenSet>,
}

impl MicrosoftGraphAdapter {
    pub fn new(settings: MicrosoftGraphSettings, tokens: MicrosoftTokenSet) -> Self {
        Self {
            settings,
            tokens: Mutex::new(tokens),
        }
    }

    pub fn from_credential(
        settings: MicrosoftGraphSettings,
        credential: &Credential,
    ) -> Result<Self, CalendarError> {
        let tokens: MicrosoftTokenSet = serde_json::from_value(credential.key.clone())
            .map_err(|e| CalendarError::invalid_credential(OFFICE365_CALENDAR, e))?;
        Ok(Self::new(settings, tokens))
    }

    pub fn factory(settings: MicrosoftGraphSettings) -> ProviderFactory {
        Arc::new(move |credential: &Credential| {
            let adapter = Self::from_credential(settings.clone(), credential)?;
            Ok(Box::new(adapter) as Box<dyn CalendarProvider>)
        })
    }

    pub async fn token_set(&self) -> MicrosoftTokenSet {
        self.tokens.lock().await.clone()
    }

    /// Resolve the access token and mailbox, refreshing first when expired.
    async fn authorize(&self) -> Result<(String, String, Option<TokenRefresh>), CalendarError> {
        let mut tokens = self.tokens.lock().await;
        let now_secs = chrono::Utc::now().timestamp();

        if !tokens.is_expired(now_secs) {
            return Ok((tokens.access_token.clone(), tokens.email.clone(), None));
        }

        tracing::debug!(email = %tokens.email, "Microsoft access token expired, refreshing");
        let refresh = self.settings.oauth.refresh(&tokens).await?;
        tokens.apply(&refresh);
        Ok((tokens.access_token.clone(), tokens.email.clone(), Some(refresh)))
    }
}

#[async_trait]
impl CalendarProvider for MicrosoftGraphAdapter {
    fn kind(&self) -> &str {
        OFFICE365_CALENDAR
    }

    #[instrument(skip(self), level = "info")]
    async fn get_availability(
        &self,
        date_from: &str,
        date_to: &str,
    ) -> Result<ProviderResponse<Vec<BusyInterval>>, CalendarError> {
        let (token, email, refresh) = self.authorize().await?;
        let url = format!("{}/me/calendar/getSchedule", self.settings.graph_base);
        let body = ScheduleRequest {
            schedules: vec![email],
            start_time: GraphDateTime::utc(date_from),
            end_time: GraphDateTime::utc(date_to),
            availability_view_interval: AVAILABILITY_VIEW_INTERVAL,
        };

        let response = self
            .settings
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let schedule: ScheduleResponse = handle_response(response).await.map_err(|e| {
            tracing::warn!("Microsoft schedule query failed: {}", e);
            e
        })?;

        Ok(ProviderResponse::new(busy_from_schedule(schedule)?, refresh))
    }

    #[instrument(skip(self, event), fields(title = %event.title), level = "info")]
    async fn create_event(
        &self,
        event: &CalendarEvent,
    ) -> Result<ProviderResponse<ProviderEvent>, CalendarError> {
        let (token, _email, refresh) = self.authorize().await?;
        let url = format!("{}/me/calendar/events", self.settings.graph_base);

        let response = self
            .settings
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&translate_event(event))
            .send()
            .await?;

        let raw: serde_json::Value = handle_response(response).await.map_err(|e| {
            tracing::error!("There was an error contacting the Graph calendar service: {}", e);
            e
        })?;

        Ok(ProviderResponse::new(provider_event(raw), refresh))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest<'a> {
    schedules: Vec<String>,
    start_time: GraphDateTime<'a>,
    end_time: GraphDateTime<'a>,
    availability_view_interval: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime<'a> {
    date_time: &'a str,
    time_zone: &'a str,
}

impl<'a> GraphDateTime<'a> {
    fn utc(date_time: &'a str) -> Self {
        Self {
            date_time,
            time_zone: "UTC",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    value: Vec<ScheduleInformation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleInformation {
    #[serde(default)]
    schedule_items: Vec<ScheduleItem>,
}

#[derive(Debug, Deserialize)]
struct ScheduleItem {
    start: ScheduleDateTime,
    end: ScheduleDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleDateTime {
    date_time: String,
}

/// Busy intervals of the first schedule. Graph returns naive UTC timestamps, so `Z` is appended.
fn busy_from_schedule(schedule: ScheduleResponse) -> Result<Vec<BusyInterval>, CalendarError> {
    let first = schedule
        .value
        .into_iter()
        .next()
        .ok_or_else(|| CalendarError::InvalidResponse("getSchedule returned no schedules".into()))?;

    Ok(first
        .schedule_items
        .into_iter()
        .map(|item| BusyInterval {
            start: format!("{}Z", item.start.date_time),
            end: format!("{}Z", item.end.date_time),
        })
        .collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent<'a> {
    subject: &'a str,
    body: GraphItemBody<'a>,
    start: GraphDateTimeZone<'a>,
    end: GraphDateTimeZone<'a>,
    attendees: Vec<GraphAttendee<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphItemBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTimeZone<'a> {
    date_time: &'a str,
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttendee<'a> {
    email_address: GraphEmailAddress<'a>,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct GraphEmailAddress<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Translate an event into the Graph `event` resource.
pub fn translate_event(event: &CalendarEvent) -> serde_json::Value {
    let payload = GraphEvent {
        subject: &event.title,
        body: GraphItemBody {
            content_type: "HTML",
            content: event.description.as_deref().unwrap_or_default(),
        },
        start: GraphDateTimeZone {
            date_time: &event.start_time,
            time_zone: &event.time_zone,
        },
        end: GraphDateTimeZone {
            date_time: &event.end_time,
            time_zone: &event.time_zone,
        },
        attendees: event
            .attendees
            .iter()
            .map(|a| GraphAttendee {
                email_address: GraphEmailAddress {
                    address: &a.email,
                    name: a.name.as_deref(),
                },
                kind: "required",
            })
            .collect(),
    };

    serde_json::to_value(payload).unwrap_or_default()
}

fn provider_event(raw: serde_json::Value) -> ProviderEvent {
    let text = |v: &serde_json::Value| v.as_str().map(str::to_string);

    ProviderEvent {
        kind: OFFICE365_CALENDAR.to_string(),
        id: text(&raw["id"]),
        start: text(&raw["start"]["dateTime"]),
        meeting_link: text(&raw["onlineMeeting"]["joinUrl"]),
        html_link: text(&raw["webLink"]),
        raw,
    }
}
