//! Route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use manualchat_core::{ChatRequest, Frame};
use manualchat_shared::ManualChatError;

use crate::AppState;

const GENERATION_FAILED: &str = "Failed to generate response";
const INVALID_BODY: &str = "Invalid request body";

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "manualchat",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/chat`: validate, compose, and stream the answer.
pub async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = match ChatRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable chat request body");
            return error_response(StatusCode::BAD_REQUEST, INVALID_BODY);
        }
    };
    let request = match request.validate() {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected chat request");
            return error_response(StatusCode::BAD_REQUEST, client_message(&e));
        }
    };

    let span = info_span!("chat", request_id = %Uuid::now_v7());
    let active = match state.chat.start(&request).instrument(span).await {
        Ok(active) => active,
        Err(e) => {
            error!(error = %e, "upstream failed before the first fragment");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED);
        }
    };

    let frames = ReceiverStream::new(active.frames)
        .map(|frame: Frame| Ok::<_, Infallible>(Bytes::from(frame.encode())));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Only validation messages are shown to callers.
fn client_message(err: &ManualChatError) -> &str {
    match err {
        ManualChatError::Validation { message } => message,
        _ => INVALID_BODY,
    }
}
