//! Chat server adapter: plugin install/enable and ephemeral posts through
//! the server's REST API (`/api/v4`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::apps::CallContext;
use crate::error::{AppError, AppResult, Service};
use crate::outbound::{endpoint, read_json};
use crate::ports::HostApi;

pub struct MattermostHost {
    http: reqwest::Client,
    site_url: String,
    bot_token: Option<String>,
}

/// Subset of the plugin manifest returned by `install_from_url`.
#[derive(Deserialize)]
struct InstalledManifest {
    id: String,
}

impl MattermostHost {
    pub fn new(http: reqwest::Client, site_url: impl Into<String>, bot_token: Option<String>) -> Self {
        Self {
            http,
            site_url: site_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.filter(|t| !t.is_empty()),
        }
    }

    fn token(&self) -> AppResult<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| AppError::Host("no bot token configured for the host server".into()))
    }

    fn api(&self, segments: &[&str]) -> AppResult<url::Url> {
        let mut full = vec!["api", "v4"];
        full.extend_from_slice(segments);
        endpoint(&self.site_url, &full)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: url::Url,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> AppResult<T> {
        let mut request = self.http.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::network(Service::Host, &e))?;
        read_json(Service::Host, response).await
    }
}

#[async_trait]
impl HostApi for MattermostHost {
    async fn install_plugin_from_url(&self, download_url: &str) -> AppResult<String> {
        let token = self.token()?;
        let mut url = self.api(&["plugins", "install_from_url"])?;
        url.query_pairs_mut()
            .append_pair("plugin_download_url", download_url)
            .append_pair("force", "true");
        let manifest: InstalledManifest = self
            .post_json(url, token, None)
            .await
            .map_err(|e| e.context("failed to install plugin"))?;
        tracing::info!(plugin_id = %manifest.id, "plugin installed");
        Ok(manifest.id)
    }

    async fn enable_plugin(&self, plugin_id: &str) -> AppResult<()> {
        let token = self.token()?;
        let url = self.api(&["plugins", plugin_id, "enable"])?;
        let _: serde_json::Value = self
            .post_json(url, token, None)
            .await
            .map_err(|e| e.context(format!("failed to enable plugin {plugin_id}")))?;
        tracing::info!(plugin_id, "plugin enabled");
        Ok(())
    }

    fn send_ephemeral(&self, context: &CallContext, message: &str) {
        // Prefer the bot token the host handed us with the call.
        let token = if context.bot_access_token.is_empty() {
            match self.bot_token.clone() {
                Some(t) => t,
                None => {
                    tracing::warn!("no bot token, dropping ephemeral notice");
                    return;
                }
            }
        } else {
            context.bot_access_token.clone()
        };
        let url = match self.api(&["posts", "ephemeral"]) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "cannot build ephemeral post URL");
                return;
            }
        };
        let body = json!({
            "user_id": context.acting_user_id,
            "post": {
                "channel_id": context.channel_id,
                "user_id": context.bot_user_id,
                "message": message,
            },
        });
        let http = self.http.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            let result = http.post(url).bearer_auth(token).json(&body).send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(%message, "ephemeral notice sent");
                }
                Ok(resp) => tracing::warn!(status = %resp.status(), %message, "ephemeral notice rejected"),
                Err(e) => tracing::warn!(error = %e, %message, "ephemeral notice failed"),
            }
        });
    }
}
