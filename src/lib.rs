//! Chat-ops app that builds a plugin pull request and deploys it onto the
//! calling chat server.
//!
//! The host framework fetches the app's [`bindings`] and posts calls back to
//! it; the `/dylan` command resolves a PR through its CI run to a plugin
//! bundle and installs it (see [`pipeline`]).

pub mod apps;
pub mod bindings;
pub mod circleci;
pub mod commands;
pub mod config;
pub mod error;
pub mod github;
pub mod host;
pub mod http;
pub(crate) mod outbound;
pub mod pipeline;
pub mod ports;
pub mod state;

pub use config::{AppConfig, load_app_config};
pub use error::{AppError, AppResult};
pub use state::AppState;
