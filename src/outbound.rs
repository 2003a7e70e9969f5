//! Shared plumbing for the outbound HTTP adapters: client construction with
//! a bounded timeout, endpoint building and response decoding.

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{AppError, AppResult, Service};

pub(crate) const USER_AGENT: &str = concat!("dylan/", env!("CARGO_PKG_VERSION"));

/// Upstream error bodies are echoed to the user; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Build an HTTP client whose every request is bounded by `timeout`.
pub(crate) fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))
}

/// Append percent-encoded path segments to a base URL.
/// `endpoint("https://api.github.com", &["repos", "o", "r"])`.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> AppResult<Url> {
    let mut url =
        Url::parse(base).map_err(|e| AppError::Config(format!("invalid base URL \"{base}\": {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("base URL \"{base}\" cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Human-readable message from an error body: the JSON `message` field when
/// there is one, otherwise the (truncated) raw text.
pub(crate) fn upstream_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(msg) = json["message"].as_str()
    {
        return msg.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Fail on non-2xx, otherwise decode the body as `T`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: Service,
    response: reqwest::Response,
) -> AppResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::network(service, &e))?;

    if !status.is_success() {
        return Err(AppError::Upstream {
            service,
            status: status.as_u16(),
            message: upstream_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| AppError::Upstream {
        service,
        status: status.as_u16(),
        message: format!("unexpected response body: {e}"),
    })
}
