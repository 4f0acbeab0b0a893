// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge HTTP server built on axum.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mensageiro_core::{InboundEvent, MensageiroError};

use crate::auth::{AuthConfig, auth_middleware};
use crate::envelope::ExtrasStore;
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub inbound_tx: mpsc::Sender<InboundEvent>,
    pub extras: Arc<ExtrasStore>,
    pub auth: AuthConfig,
    pub start_time: std::time::Instant,
}

/// Routes: GET /health (public), POST /v1/events (bearer auth).
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/events", post(handlers::post_event))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(api_routes)
}

/// Binds `host:port` and serves until `cancel` fires.
pub async fn start_server(
    host: &str,
    port: u16,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), MensageiroError> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MensageiroError::Delivery {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| MensageiroError::Delivery {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn state(token: Option<&str>) -> (GatewayState, mpsc::Receiver<InboundEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let state = GatewayState {
            inbound_tx: tx,
            extras: Arc::new(ExtrasStore::new(Duration::from_secs(60))),
            auth: AuthConfig {
                bearer_token: token.map(String::from),
            },
            start_time: std::time::Instant::now(),
        };
        (state, rx)
    }

    fn post(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/events")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn event_body() -> serde_json::Value {
        serde_json::json!({
            "event": {"id": "m1", "from": "55@c.us", "body": "oi", "type": "chat"},
            "mentions": ["bot@c.us"]
        })
    }

    #[tokio::test]
    async fn accepted_event_reaches_channel_and_extras() {
        let (state, mut rx) = state(Some("tok"));
        let extras = state.extras.clone();
        let response = router(state)
            .oneshot(post(Some("tok"), event_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, "m1");
        assert_eq!(extras.get("m1").unwrap().mentions, vec!["bot@c.us"]);
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized() {
        let (state, mut rx) = state(Some("tok"));
        let response = router(state)
            .oneshot(post(Some("nope"), event_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_configured_token_fails_closed() {
        let (state, _rx) = state(None);
        let response = router(state)
            .oneshot(post(Some("anything"), event_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_media_is_bad_request() {
        let (state, _rx) = state(Some("tok"));
        let body = serde_json::json!({
            "event": {"id": "m2", "from": "55@c.us", "type": "image", "has_media": true},
            "media": {"data": "***", "mime_type": "image/png"}
        });
        let response = router(state).oneshot(post(Some("tok"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let (state, _rx) = state(None);
        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "healthy");
    }
}
