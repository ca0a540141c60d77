//! Mapping of service errors onto HTTP responses.

use serde::Serialize;
use slotbook_calendar::CalendarError;
use slotbook_services::BookingError;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            details,
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        warp::reply::with_status(warp::reply::json(&self), status).into_response()
    }
}

pub fn status_for(err: &BookingError) -> StatusCode {
    match err {
        BookingError::UserNotFound(_) => StatusCode::NOT_FOUND,
        BookingError::NoCalendarConnected(_) => StatusCode::CONFLICT,
        BookingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        BookingError::Calendar(e) => match e {
            CalendarError::NoAdapter(_) | CalendarError::InvalidCredential { .. } => {
                StatusCode::CONFLICT
            }
            CalendarError::Auth(_) | CalendarError::TokenExpired => StatusCode::UNAUTHORIZED,
            CalendarError::AuthRequired => StatusCode::FORBIDDEN,
            CalendarError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            CalendarError::ApiError { .. }
            | CalendarError::InvalidResponse(_)
            | CalendarError::NetworkError(_) => StatusCode::BAD_GATEWAY,
        },
        BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a service error, logging server-side failures.
pub fn error_response(err: &BookingError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), "Request failed: {}", err);
    } else {
        tracing::warn!(status = status.as_u16(), "Request rejected: {}", err);
    }

    let details = match err {
        BookingError::Store(_) => None,
        other => Some(other.to_string()),
    };
    ErrorResponse::new(err.user_message(), details).into_response(status)
}
