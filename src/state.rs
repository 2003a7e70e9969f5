use std::sync::Arc;

use crate::apps::Manifest;
use crate::bindings::BindingTree;
use crate::circleci::CircleCiClient;
use crate::commands::{Collaborators, build_binding_tree};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::github::GitHubClient;
use crate::host::MattermostHost;
use crate::outbound::build_client;

/// Shared, read-only state for every request task.
pub struct AppState {
    pub config: AppConfig,
    pub tree: BindingTree,
    pub manifest: Manifest,
}

impl AppState {
    pub fn new(config: AppConfig, deps: Collaborators) -> AppResult<Self> {
        let tree = build_binding_tree(&config, deps)
            .map_err(|e| AppError::Config(format!("invalid binding tree: {e}")))?;
        let manifest = Manifest::from_config(&config);
        Ok(Self {
            config,
            tree,
            manifest,
        })
    }

    /// Wire the GitHub, CircleCI and host adapters over one shared HTTP
    /// client bounded by the configured timeout.
    pub fn with_live_services(config: AppConfig) -> AppResult<Self> {
        let http = build_client(config.request_timeout())?;
        let deps = Collaborators {
            code_host: Arc::new(GitHubClient::new(
                http.clone(),
                config.github_api_url.clone(),
                config.github_token.clone(),
            )),
            ci: Arc::new(CircleCiClient::new(
                http.clone(),
                config.circleci_api_url.clone(),
                config.circleci_token.clone(),
            )),
            host: Arc::new(MattermostHost::new(
                http,
                config.site_url.clone(),
                config.bot_token.clone(),
            )),
        };
        tracing::info!(
            github = %config.github_api_url,
            circleci = %config.circleci_api_url,
            site = %config.site_url,
            github_auth = config.github_token.is_some(),
            circleci_auth = config.circleci_token.is_some(),
            "outbound services configured"
        );
        Self::new(config, deps)
    }
}
