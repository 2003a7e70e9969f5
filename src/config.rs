use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// File name of the service config inside [`config_dir`].
const CONFIG_FILE: &str = "config.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/dylan/`
/// - Linux: `~/.config/dylan/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/dylan/`
///
/// Falls back to `~/.dylan/` if the platform dir is unavailable.
pub(crate) fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dylan"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dylan")
        })
}

/// Service configuration. Every field has a default so a partial JSON file
/// (or none at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: String,
    /// Path prefix all app routes live under.
    pub route_prefix: String,

    pub app_id: String,
    /// Id of the host plugin that serves this app.
    pub plugin_id: String,
    pub display_name: String,
    pub homepage_url: String,
    /// Icon file name, served from `<prefix>/static/`.
    pub icon: String,

    pub github_api_url: String,
    /// Organization searched for plugin repositories and pull requests.
    pub github_org: String,
    /// Only repositories whose name starts with this are offered.
    pub repo_prefix: String,
    pub github_token: Option<String>,
    /// Check run that carries the CI workflow id.
    pub check_name: String,

    pub circleci_api_url: String,
    pub ci_job_name: String,
    pub artifact_suffix: String,
    pub circleci_token: Option<String>,

    /// Base URL of the chat server plugins get installed into.
    pub site_url: String,
    pub bot_token: Option<String>,

    /// Upper bound for each outbound HTTP call.
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4000".to_string(),
            route_prefix: "/app".to_string(),
            app_id: "dylan".to_string(),
            plugin_id: "dylan".to_string(),
            display_name: "Dylan Testing App".to_string(),
            homepage_url: "https://github.com/mickmister/mattermost-app-dylan".to_string(),
            icon: "dylan.svg".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_org: "mattermost".to_string(),
            repo_prefix: "mattermost-plugin".to_string(),
            github_token: None,
            check_name: "ci".to_string(),
            circleci_api_url: "https://circleci.com/api/v2".to_string(),
            ci_job_name: "plugin-ci/build".to_string(),
            artifact_suffix: ".tar.gz".to_string(),
            circleci_token: None,
            site_url: "http://localhost:8065".to_string(),
            bot_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Fill secrets and the site URL from the environment.
    /// File values win for everything except `DYLAN_SITE_URL`, which lets
    /// the same file be reused across servers.
    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if self.github_token.as_deref().is_none_or(str::is_empty) {
            self.github_token = non_empty("GH_TOKEN").or_else(|| non_empty("GITHUB_TOKEN"));
        }
        if self.circleci_token.as_deref().is_none_or(str::is_empty) {
            self.circleci_token = non_empty("CIRCLE_TOKEN");
        }
        if self.bot_token.as_deref().is_none_or(str::is_empty) {
            self.bot_token = non_empty("DYLAN_BOT_TOKEN");
        }
        if let Some(site_url) = non_empty("DYLAN_SITE_URL") {
            self.site_url = site_url;
        }
    }

    fn validate(&self) -> AppResult<()> {
        if !self.route_prefix.starts_with('/') || self.route_prefix.ends_with('/') {
            return Err(AppError::Config(format!(
                "route_prefix must start with '/' and not end with one, got \"{}\"",
                self.route_prefix
            )));
        }
        for (name, value) in [
            ("github_api_url", &self.github_api_url),
            ("circleci_api_url", &self.circleci_api_url),
            ("site_url", &self.site_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        Ok(())
    }
}

/// Load a JSON config file, returning defaults if it does not exist.
/// A file that exists but cannot be read or parsed is an error: silently
/// falling back would deploy against the wrong server.
pub(crate) fn load_json_config(path: &Path) -> AppResult<AppConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("could not read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("corrupt config {}: {e}", path.display())))
}

/// Load the service config: explicit path or `<config_dir>/config.json`,
/// then environment overrides, then validation.
pub fn load_app_config(path: Option<&Path>) -> AppResult<AppConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_dir().join(CONFIG_FILE));
    let mut config = load_json_config(&path)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
