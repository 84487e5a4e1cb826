//! services/api/src/web/chat.rs
//!
//! The chat endpoint: the request guard (credential check, rate limit,
//! schema validation) followed by the inference proxy, which relays the
//! model's output as a streaming response.

use crate::web::{cors, guard, protocol::ChatRequest, state::AppState};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use coffee_analysis_core::ports::{ChatStream, RateLimitDecision};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        chat_handler,
    ),
    components(
        schemas(ChatRequest)
    ),
    tags(
        (name = "Coffee Analysis API", description = "Streaming chat proxy for coffee package analysis.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Handlers
//=========================================================================================

/// Stream a model response for a validated message list.
///
/// The body is relayed incrementally as plain text; callers read chunks
/// until end of stream and hand the concatenated text to the extraction
/// engine.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Streaming model output", body = String),
        (status = 400, description = "Invalid request format"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 503, description = "Service temporarily unavailable"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let origin = app_state.config.frontend_origin.clone();

    // Configuration check first: absence of the credential is a service
    // condition, never a validation error.
    let Some(chat_adapter) = app_state.chat_adapter.clone() else {
        error!("Chat model credential is not configured");
        return plain_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
            &origin,
        );
    };

    let client_id = client_identifier(&headers);
    if let RateLimitDecision::Limited { retry_after_secs } =
        app_state.rate_limiter.check(&client_id).await
    {
        warn!(client = %client_id, "rate limit exceeded");
        let mut response = plain_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
            &origin,
        );
        if let Ok(value) = retry_after_secs.to_string().parse() {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    // Body shape problems surface only after the rate limiter has counted
    // the request, and always as a 400 with the CORS headers attached.
    let Json(payload) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!(client = %client_id, reason = %rejection, "request body rejected");
            return plain_response(StatusCode::BAD_REQUEST, "Invalid request format", &origin);
        }
    };

    let messages = match guard::validate_messages(&payload.messages) {
        Ok(messages) => messages,
        Err(rejection) => {
            warn!(client = %client_id, reason = %rejection, "request rejected");
            return plain_response(StatusCode::BAD_REQUEST, "Invalid request format", &origin);
        }
    };

    let request_id = Uuid::new_v4();
    info!(%request_id, client = %client_id, messages = messages.len(), "forwarding chat request");

    match chat_adapter.stream_chat(messages).await {
        Ok(upstream) => {
            let relayed = relay_stream(upstream, move |full_text| {
                // Exactly-once completion hook: log a structural summary of
                // what the extraction engine reads out of the final text.
                let record = coffee_analysis_core::extract(&full_text);
                info!(
                    %request_id,
                    chars = full_text.chars().count(),
                    roast = %record.roast_level,
                    needs_reupload = record.needs_reupload,
                    "chat stream completed"
                );
            });

            let mut response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(Body::from_stream(relayed))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
            response.headers_mut().extend(cors::response_headers(&origin));
            response
        }
        Err(e) => {
            // Provider detail stays in the server log.
            error!(%request_id, "Chat API error: {e}");
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", &origin)
        }
    }
}

/// CORS preflight for the chat endpoint. Answers with the allow headers
/// only when the Origin and Access-Control-Request-* headers are present,
/// else an empty body.
pub async fn chat_preflight_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if cors::is_preflight(&headers) {
        let mut response = StatusCode::OK.into_response();
        response
            .headers_mut()
            .extend(cors::preflight_headers(&app_state.config.frontend_origin));
        response
    } else {
        StatusCode::OK.into_response()
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Derives the rate-limit identifier from the first forwarded-address
/// token, or a sentinel when the header is absent.
fn client_identifier(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|token| token.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn plain_response(status: StatusCode, body: &'static str, origin: &str) -> Response {
    let mut response = (status, body).into_response();
    response.headers_mut().extend(cors::response_headers(origin));
    response
}

/// Relays upstream chunks in arrival order and hands the concatenated
/// text to `on_finish` exactly once when the stream completes. A
/// mid-stream upstream error terminates the body (the status line is
/// already committed) and skips the completion hook.
fn relay_stream(
    mut upstream: ChatStream,
    on_finish: impl FnOnce(String) + Send + 'static,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    async_stream::stream! {
        let mut full_text = String::new();
        let mut failed = false;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    full_text.push_str(&chunk);
                    yield Ok(Bytes::from(chunk));
                }
                Err(e) => {
                    error!("Upstream error mid-stream: {e}");
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            on_finish(full_text);
        }
    }
}

//=========================================================================================
// Tests
//=========================================================================================
