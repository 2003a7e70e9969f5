use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Top-level location for slash commands.
pub const LOCATION_COMMAND: &str = "/command";

/// Served by a host plugin rather than a standalone HTTP app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppType {
    Plugin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ActAsBot,
}

/// Static descriptor served at `/manifest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub app_id: String,
    /// Host plugin resolving a `plugin` app type.
    pub plugin_id: String,
    pub display_name: String,
    pub homepage_url: String,
    pub app_type: AppType,
    pub icon: String,
    pub requested_permissions: Vec<Permission>,
    pub requested_locations: Vec<String>,
}

impl Manifest {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            app_id: config.app_id.clone(),
            plugin_id: config.plugin_id.clone(),
            display_name: config.display_name.clone(),
            homepage_url: config.homepage_url.clone(),
            app_type: AppType::Plugin,
            icon: config.icon.clone(),
            requested_permissions: vec![Permission::ActAsBot],
            requested_locations: vec![LOCATION_COMMAND.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_from_default_config() {
        let manifest = Manifest::from_config(&AppConfig::default());
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["app_id"], "dylan");
        assert_eq!(json["plugin_id"], "dylan");
        assert_eq!(json["app_type"], "plugin");
        assert_eq!(json["requested_permissions"], serde_json::json!(["act_as_bot"]));
        assert_eq!(json["requested_locations"], serde_json::json!(["/command"]));
        assert_eq!(json["icon"], "dylan.svg");
    }

    #[test]
    fn test_plugin_id_follows_config() {
        let config = AppConfig {
            plugin_id: "com.example.dylan".into(),
            ..AppConfig::default()
        };
        let manifest = Manifest::from_config(&config);
        assert_eq!(manifest.plugin_id, "com.example.dylan");
        assert_eq!(manifest.app_id, "dylan");
    }
}
