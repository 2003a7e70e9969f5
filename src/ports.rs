//! Capability traits for the three external collaborators.
//!
//! The binding tree, the `/dylan` handler and the build pipeline only see
//! these traits; the reqwest-backed adapters live in `github`, `circleci`
//! and `host`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::apps::CallContext;
use crate::error::AppResult;

/// Open pull request as returned by issue search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub title: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub head_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckRun {
    #[serde(default)]
    pub name: String,
    /// CI-provider payload; CircleCI stores `{"workflow-id": ...}` here.
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowJob {
    pub name: String,
    #[serde(default)]
    pub project_slug: String,
    #[serde(default)]
    pub job_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub url: String,
}

/// Code-hosting search and review API.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Open pull requests in `org/repo` matching the free-text `query`.
    async fn search_pull_requests(
        &self,
        org: &str,
        repo: &str,
        query: &str,
    ) -> AppResult<Vec<PullRequestSummary>>;

    /// Repository names in `org` whose name starts with `name_prefix`.
    async fn search_repositories(&self, org: &str, name_prefix: &str) -> AppResult<Vec<String>>;

    async fn get_pull_request(&self, org: &str, repo: &str, number: u64) -> AppResult<PullRequest>;

    async fn list_check_runs(
        &self,
        org: &str,
        repo: &str,
        sha: &str,
        check_name: &str,
    ) -> AppResult<Vec<CheckRun>>;
}

/// CI artifact API.
#[async_trait]
pub trait CiService: Send + Sync {
    async fn list_workflow_jobs(&self, workflow_id: &str) -> AppResult<Vec<WorkflowJob>>;

    async fn list_job_artifacts(&self, project_slug: &str, job_number: u64)
        -> AppResult<Vec<Artifact>>;
}

/// The chat server the built plugin gets deployed to.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Download and install a plugin bundle, replacing an existing version.
    /// Returns the installed plugin id.
    async fn install_plugin_from_url(&self, url: &str) -> AppResult<String>;

    async fn enable_plugin(&self, plugin_id: &str) -> AppResult<()>;

    /// Post a message only the acting user sees. Fire-and-forget: returns
    /// immediately and never reports delivery.
    fn send_ephemeral(&self, context: &CallContext, message: &str);
}
