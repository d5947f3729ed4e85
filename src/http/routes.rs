//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::app::AppState;
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(state.config.client_origin.as_deref())),
        )
        .with_state(state)
}

/// CORS from a comma-separated origin list; unset allows any origin
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let origin = match client_origin {
        Some(list) => {
            let allowed: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|s| {
                    let parsed = s.trim().parse::<HeaderValue>();
                    if parsed.is_err() {
                        warn!(origin = s.trim(), "Ignoring unparsable CORS origin");
                    }
                    parsed.ok()
                })
                .collect();
            AllowOrigin::list(allowed)
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// ============================================================================
// Health endpoints
// ============================================================================

#[derive(Serialize)]
struct LivenessResponse {
    ok: bool,
}

async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse { ok: true })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time_ms: u64,
    connections: usize,
    joined_connections: usize,
    humans: usize,
    bots: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        server_time_ms: unix_millis(),
        connections: state.sessions.connected(),
        joined_connections: state.sessions.joined(),
        humans: state.room.human_count(),
        bots: state.room.bot_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router(pairs: &'static [(&'static str, &'static str)]) -> Router {
        let config = Config::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();
        let (state, _room) = AppState::new(config);
        build_router(state)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn healthz_keeps_legacy_contract() {
        let (status, body) = get_json(router(&[]), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn health_reports_census() {
        let (status, body) = get_json(router(&[("BOT_COUNT", "5")]), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["bots"], 5);
        assert_eq!(body["humans"], 0);
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn cors_echoes_configured_origin() {
        let router = router(&[("CLIENT_ORIGIN", "https://play.example, https://alt.example")]);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header(header::ORIGIN, "https://alt.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://alt.example"
        );
    }
}
