// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP handlers: POST /v1/events and GET /health.

use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::envelope::{EventEnvelope, EventExtras};
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// POST /v1/events
///
/// Stores the envelope extras and queues the event for the dispatcher. Answers
/// 202 as soon as the event is queued; replies go out through the outbound URL.
pub async fn post_event(
    State(state): State<GatewayState>,
    Json(envelope): Json<EventEnvelope>,
) -> Response {
    let media = match envelope.media.as_ref().map(|m| m.decode()).transpose() {
        Ok(media) => media,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let event = envelope.event;
    let id = event.id.clone();
    if !id.is_empty() {
        state.extras.insert(
            &id,
            EventExtras {
                chat: envelope.chat,
                mentions: envelope.mentions,
                quoted: envelope.quoted,
                media,
            },
        );
    }

    match tokio::time::timeout(Duration::from_secs(5), state.inbound_tx.send(event)).await {
        Ok(Ok(())) => {
            tracing::debug!(message_id = %id, "bridge event queued");
            (StatusCode::ACCEPTED, Json(AcceptedResponse { accepted: true, id })).into_response()
        }
        Ok(Err(_)) => error(StatusCode::SERVICE_UNAVAILABLE, "dispatcher is not running"),
        Err(_) => error(StatusCode::SERVICE_UNAVAILABLE, "event queue is full"),
    }
}

/// GET /health (unauthenticated)
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
