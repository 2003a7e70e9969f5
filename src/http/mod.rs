//! Inbound HTTP surface: the app routes under the configured prefix plus
//! a health check.

mod calls;
mod static_files;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::apps::CallResponse;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Error envelope with an explicit status.
fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(CallResponse::error(message))).into_response()
}

fn not_found(path: &str) -> Response {
    tracing::debug!(path, "no route");
    error_response(StatusCode::NOT_FOUND, format!("{path} not found"))
}

/// Everything under the prefix, in priority order: bindings, manifest,
/// static assets, then the binding tree. The host may call any of these
/// with any method.
async fn dispatch(State(state): State<Arc<AppState>>, uri: Uri, body: Bytes) -> Response {
    let full = uri.path();
    let path = match full.strip_prefix(state.config.route_prefix.as_str()) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return not_found(full),
    };

    if path == "/bindings" {
        return match serde_json::to_value(state.tree.render()) {
            Ok(data) => Json(CallResponse::data(data)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize bindings");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
            }
        };
    }
    if path == "/manifest" {
        return Json(&state.manifest).into_response();
    }
    if let Some(asset) = path.strip_prefix("/static") {
        return static_files::serve_asset(asset.trim_start_matches('/'));
    }

    match calls::invoke(&state.tree, path, &body).await {
        Some(response) => Json(response).into_response(),
        None => not_found(full),
    }
}

/// Build the router (exposed for testing).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_server(state: Arc<AppState>) -> std::io::Result<()> {
    let bind_addr = state.config.listen_addr.clone();
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, prefix = %state.config.route_prefix, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::fake_collaborators;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Request, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_state_with(config: AppConfig) -> Arc<AppState> {
        Arc::new(AppState::new(config, fake_collaborators()).unwrap())
    }

    fn test_state() -> Arc<AppState> {
        test_state_with(AppConfig::default())
    }

    fn post(url: &str, body: &str) -> Request<Body> {
        Request::post(url)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = build_router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = send(test_state(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn test_bindings_envelope() {
        let (status, json) =
            send(test_state(), Request::get("/app/bindings").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "ok");
        assert_eq!(json["data"][0]["location"], "/command");
        assert_eq!(json["data"][0]["bindings"][0]["call"]["path"], "/commands/dylan");
        assert_eq!(json["data"][0]["bindings"][0]["form"]["fields"][0]["name"], "pr");
    }

    #[tokio::test]
    async fn test_bindings_accepts_post() {
        let (status, json) = send(test_state(), post("/app/bindings", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "ok");
    }

    #[tokio::test]
    async fn test_manifest() {
        let (status, json) =
            send(test_state(), Request::get("/app/manifest").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["app_id"], "dylan");
        assert_eq!(json["plugin_id"], "dylan");
        assert_eq!(json["app_type"], "plugin");
        assert_eq!(json["requested_locations"], json!(["/command"]));
    }

    #[tokio::test]
    async fn test_static_icon() {
        let resp = build_router(test_state())
            .oneshot(Request::get("/app/static/dylan.svg").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/svg+xml");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"<svg"));
    }

    #[tokio::test]
    async fn test_static_missing_is_error_envelope() {
        let (status, json) = send(
            test_state(),
            Request::get("/app/static/nope.png").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["type"], "error");
    }

    #[tokio::test]
    async fn test_form_call() {
        let (status, json) = send(test_state(), post("/app/commands/dylan/form", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "form");
        assert_eq!(json["form"]["title"], "Build plugin PR for this server");
        assert_eq!(json["form"]["fields"][0]["name"], "repo");
        assert_eq!(json["form"]["fields"][1]["name"], "pr");
    }

    #[tokio::test]
    async fn test_submit_deploys() {
        let pr = "https://github.com/mattermost/mattermost-plugin-jira/pull/42";
        let body = json!({"values": {"pr": pr}, "context": {"acting_user_id": "u1"}}).to_string();
        let (status, json) = send(test_state(), post("/app/commands/dylan/submit", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "ok");
        assert_eq!(
            json["markdown"],
            format!("Built plugin and deployed this server for PR {pr}")
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_error_envelope_with_ok_status() {
        let (status, json) = send(test_state(), post("/app/commands/dylan/submit", "{oops")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "error");
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .starts_with("error unmarshaling call request")
        );
    }

    #[tokio::test]
    async fn test_unknown_command_is_404() {
        let (status, json) = send(test_state(), post("/app/commands/nope/submit", "{}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["type"], "error");
    }

    #[tokio::test]
    async fn test_paths_outside_prefix_are_404() {
        for url in ["/bindings", "/appx/bindings", "/other/commands/dylan/form"] {
            let (status, json) = send(test_state(), post(url, "{}")).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{url}");
            assert_eq!(json["type"], "error");
        }
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let config = AppConfig {
            route_prefix: "/plugins/dylan".into(),
            ..AppConfig::default()
        };
        let state = test_state_with(config);
        let (status, _) = send(state.clone(), post("/plugins/dylan/commands/dylan/form", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(state, post("/app/commands/dylan/form", "{}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
