//! Pull request → installed plugin.
//!
//! A strict sequence: parse the PR URL, resolve its head commit, find the CI
//! check run, recover the workflow, pick the build artifact, install it into
//! the host and enable it. Any failing step aborts the rest.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::Instrument;

use crate::apps::CallContext;
use crate::error::{AppError, AppResult};
use crate::ports::{Artifact, CheckRun, CiService, CodeHost, HostApi, WorkflowJob};

/// Key CircleCI writes into the check run's `external_id` JSON.
const WORKFLOW_ID_KEY: &str = "workflow-id";

/// Pull request coordinates taken from its web URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub org: String,
    pub repo: String,
    pub number: u64,
}

/// Parse `https://github.com/<org>/<repo>/pull/<number>`.
///
/// The path must have at least five `/`-separated segments (the leading
/// empty one included) and a numeric fifth segment.
pub fn parse_pr_url(raw: &str) -> AppResult<PullRequestRef> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| AppError::validation(format!("invalid pull request URL \"{raw}\": {e}")))?;
    let parts: Vec<&str> = url.path().split('/').collect();
    if parts.len() < 5 {
        return Err(AppError::validation(format!(
            "pull request URL \"{raw}\" must look like https://github.com/<org>/<repo>/pull/<number>"
        )));
    }
    let (org, repo, number) = (parts[1], parts[2], parts[4]);
    if org.is_empty() || repo.is_empty() {
        return Err(AppError::validation(format!(
            "pull request URL \"{raw}\" is missing the organization or repository"
        )));
    }
    let number = number.parse::<u64>().map_err(|_| {
        AppError::validation(format!("pull request number \"{number}\" is not a number"))
    })?;
    Ok(PullRequestRef {
        org: org.to_string(),
        repo: repo.to_string(),
        number,
    })
}

/// Workflow id from the first check run's `external_id`.
pub(crate) fn workflow_id(runs: &[CheckRun], check_name: &str) -> AppResult<String> {
    let run = runs.first().ok_or_else(|| {
        AppError::not_found(format!("no \"{check_name}\" check run found for this pull request"))
    })?;
    let external_id = run
        .external_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::not_found(format!("check run \"{}\" has no external id", run.name)))?;
    let data: HashMap<String, serde_json::Value> = serde_json::from_str(external_id)
        .map_err(|e| AppError::validation(format!("check run external id is not valid JSON: {e}")))?;
    match data.get(WORKFLOW_ID_KEY) {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(AppError::not_found(format!(
            "check run external id has no \"{WORKFLOW_ID_KEY}\""
        ))),
    }
}

/// The job named `job_name`. Reruns append jobs, so the last match wins.
pub(crate) fn select_job<'a>(jobs: &'a [WorkflowJob], job_name: &str) -> AppResult<(&'a str, u64)> {
    jobs.iter()
        .rev()
        .filter(|j| j.name == job_name && !j.project_slug.is_empty())
        .find_map(|j| j.job_number.map(|n| (j.project_slug.as_str(), n)))
        .ok_or_else(|| AppError::not_found(format!("no job found for name {job_name}")))
}

/// First artifact whose path ends with `suffix`, wherever it sits in the list.
pub(crate) fn select_artifact<'a>(artifacts: &'a [Artifact], suffix: &str) -> AppResult<&'a Artifact> {
    artifacts
        .iter()
        .find(|a| a.path.ends_with(suffix))
        .ok_or_else(|| AppError::not_found(format!("couldn't find a {suffix} artifact")))
}

/// Names the pipeline looks for in the CI records.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub check_name: String,
    pub job_name: String,
    pub artifact_suffix: String,
}

/// Outcome of a successful deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub plugin_id: String,
    pub artifact_url: String,
}

pub struct DeployPipeline {
    code_host: Arc<dyn CodeHost>,
    ci: Arc<dyn CiService>,
    host: Arc<dyn HostApi>,
    settings: PipelineSettings,
}

impl DeployPipeline {
    pub fn new(
        code_host: Arc<dyn CodeHost>,
        ci: Arc<dyn CiService>,
        host: Arc<dyn HostApi>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            code_host,
            ci,
            host,
            settings,
        }
    }

    /// Build and deploy the plugin for the PR at `pr_url`, keeping the
    /// acting user posted through ephemeral notices.
    pub async fn run(&self, pr_url: &str, context: &CallContext) -> AppResult<Deployment> {
        let pr = parse_pr_url(pr_url)?;
        let span = tracing::info_span!("deploy", org = %pr.org, repo = %pr.repo, number = pr.number);
        self.deploy(&pr, context).instrument(span).await
    }

    async fn deploy(&self, pr: &PullRequestRef, context: &CallContext) -> AppResult<Deployment> {
        self.host.send_ephemeral(context, "Getting pull request information");
        let pull = self
            .code_host
            .get_pull_request(&pr.org, &pr.repo, pr.number)
            .await?;
        tracing::debug!(sha = %pull.head_sha, "resolved head commit");

        self.host.send_ephemeral(context, "Getting CI check information");
        let runs = self
            .code_host
            .list_check_runs(&pr.org, &pr.repo, &pull.head_sha, &self.settings.check_name)
            .await?;
        let workflow = workflow_id(&runs, &self.settings.check_name)?;

        self.host.send_ephemeral(context, "Getting artifacts URL");
        let jobs = self.ci.list_workflow_jobs(&workflow).await?;
        let (slug, job_number) = select_job(&jobs, &self.settings.job_name)?;
        let artifacts = self.ci.list_job_artifacts(slug, job_number).await?;
        let artifact = select_artifact(&artifacts, &self.settings.artifact_suffix)?;
        tracing::info!(workflow = %workflow, job_number, artifact = %artifact.path, "artifact selected");

        self.host
            .send_ephemeral(context, "Downloading plugin artifact and installing plugin");
        let plugin_id = self.host.install_plugin_from_url(&artifact.url).await?;

        self.host.send_ephemeral(context, "Enabling plugin");
        self.host.enable_plugin(&plugin_id).await?;

        tracing::info!(plugin_id = %plugin_id, "deployed");
        Ok(Deployment {
            plugin_id,
            artifact_url: artifact.url.clone(),
        })
    }
}
