//! warp filters for the booking API.

use std::convert::Infallible;
use std::sync::Arc;

use serde::Deserialize;
use slotbook_services::{BookingRequest, BookingService};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::error::{error_response, ErrorResponse};

/// Largest accepted booking body, in bytes.
const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub date_from: String,
    pub date_to: String,
}

/// All API routes with error recovery and request tracing.
pub fn routes(
    service: Arc<BookingService>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let profile = warp::path!("api" / "users" / String)
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(profile_handler);

    let availability = warp::path!("api" / "availability" / String)
        .and(warp::get())
        .and(warp::query::<AvailabilityQuery>())
        .and(with_service(service.clone()))
        .and_then(availability_handler);

    let book = warp::path!("api" / "book" / String)
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<BookingRequest>())
        .and(with_service(service))
        .and_then(book_handler);

    profile
        .or(availability)
        .or(book)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_service(
    service: Arc<BookingService>,
) -> impl Filter<Extract = (Arc<BookingService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn profile_handler(
    username: String,
    service: Arc<BookingService>,
) -> Result<Response, Infallible> {
    Ok(match service.profile(&username) {
        Ok(profile) => warp::reply::json(&profile).into_response(),
        Err(e) => error_response(&e),
    })
}

async fn availability_handler(
    username: String,
    query: AvailabilityQuery,
    service: Arc<BookingService>,
) -> Result<Response, Infallible> {
    Ok(
        match service
            .busy_times(&username, &query.date_from, &query.date_to)
            .await
        {
            Ok(availability) => warp::reply::json(&availability).into_response(),
            Err(e) => error_response(&e),
        },
    )
}

/// Create the booking and answer with the provider's event payload.
async fn book_handler(
    username: String,
    request: BookingRequest,
    service: Arc<BookingService>,
) -> Result<Response, Infallible> {
    Ok(match service.book(&username, &request).await {
        Ok(event) => warp::reply::json(&event.raw).into_response(),
        Err(e) => error_response(&e),
    })
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid booking request: {}", e))
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("dateFrom and dateTo are required: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(ErrorResponse::new(message, None).into_response(status))
}
