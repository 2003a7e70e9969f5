//! `/dylan`: pick a plugin repository and one of its open pull requests,
//! then build and deploy that PR onto the calling server.

use std::sync::Arc;

use async_trait::async_trait;

use crate::apps::{CallRequest, CallResponse, CallType, Field, FieldValue, Form, SelectOption};
use crate::bindings::CallHandler;
use crate::error::{AppError, AppResult};
use crate::pipeline::DeployPipeline;
use crate::ports::CodeHost;

pub(crate) const FORM_TITLE: &str = "Build plugin PR for this server";

pub struct DylanCommand {
    code_host: Arc<dyn CodeHost>,
    org: String,
    repo_prefix: String,
    pipeline: DeployPipeline,
}

impl DylanCommand {
    pub fn new(
        code_host: Arc<dyn CodeHost>,
        org: impl Into<String>,
        repo_prefix: impl Into<String>,
        pipeline: DeployPipeline,
    ) -> Self {
        Self {
            code_host,
            org: org.into(),
            repo_prefix: repo_prefix.into(),
            pipeline,
        }
    }

    /// Fresh form. PR options follow the currently selected repo and the
    /// caller's partial text; current values are carried over.
    async fn form(&self, request: &CallRequest) -> AppResult<Form> {
        let repo = request
            .value("repo")
            .and_then(FieldValue::as_str)
            .unwrap_or_default();

        let prs = if repo.is_empty() {
            Vec::new()
        } else {
            self.code_host
                .search_pull_requests(&self.org, repo, &request.query)
                .await
                .map_err(|e| e.context("failed to fetch PRs"))?
        };
        let repos = self
            .code_host
            .search_repositories(&self.org, &self.repo_prefix)
            .await
            .map_err(|e| e.context("failed to fetch repos"))?;
        tracing::debug!(repo, prs = prs.len(), repos = repos.len(), "form options loaded");

        let repo_options = repos
            .into_iter()
            .map(|name| SelectOption::new(name.clone(), name))
            .collect();
        let pr_options = prs
            .into_iter()
            .map(|pr| SelectOption::new(pr.title, pr.html_url))
            .collect();

        Ok(Form::new(vec![
            Field::static_select("repo", repo_options)
                .modal_label("Repo")
                .required()
                .refresh()
                .value(request.values.get("repo").cloned()),
            Field::static_select("pr", pr_options)
                .modal_label("Pull Request")
                .required()
                .value(request.values.get("pr").cloned()),
        ])
        .title(FORM_TITLE))
    }

    async fn submit(&self, request: &CallRequest, pr: &FieldValue) -> AppResult<String> {
        let pr_url = pr
            .as_str()
            .ok_or_else(|| AppError::validation(format!("invalid form of pr value {}", pr.kind())))?;
        tracing::info!(pr_url, user = %request.context.acting_user_id, "build requested");
        let deployment = self.pipeline.run(pr_url, &request.context).await?;
        tracing::info!(
            pr_url,
            plugin_id = %deployment.plugin_id,
            artifact = %deployment.artifact_url,
            "build deployed"
        );
        Ok(format!("Built plugin and deployed this server for PR {pr_url}"))
    }
}

#[async_trait]
impl CallHandler for DylanCommand {
    async fn handle(&self, request: CallRequest, call_type: CallType) -> CallResponse {
        let result = match (call_type, request.value("pr")) {
            (CallType::Submit, Some(pr)) => self.submit(&request, pr).await.map(CallResponse::markdown),
            _ => self.form(&request).await.map(CallResponse::form),
        };
        result.unwrap_or_else(|e| {
            tracing::error!(%call_type, error = %e, "dylan call failed");
            CallResponse::error(e)
        })
    }
}
