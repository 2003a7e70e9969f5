//! CircleCI v2 client: workflow jobs and job artifacts.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, AppResult, Service};
use crate::outbound::{endpoint, read_json};
use crate::ports::{Artifact, CiService, WorkflowJob};

pub struct CircleCiClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ItemsResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl CircleCiClient {
    /// `token` is only needed for private projects.
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    async fn get_items<T: serde::de::DeserializeOwned>(&self, url: Url) -> AppResult<Vec<T>> {
        let mut request = self.http.get(url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Circle-Token", token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::network(Service::CircleCi, &e))?;
        let body: ItemsResponse<T> = read_json(Service::CircleCi, response).await?;
        Ok(body.items)
    }
}

#[async_trait]
impl CiService for CircleCiClient {
    async fn list_workflow_jobs(&self, workflow_id: &str) -> AppResult<Vec<WorkflowJob>> {
        let url = endpoint(&self.api_url, &["workflow", workflow_id, "job"])?;
        self.get_items(url).await
    }

    async fn list_job_artifacts(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> AppResult<Vec<Artifact>> {
        // The slug (`gh/org/repo`) is itself a path, not a single segment.
        let number = job_number.to_string();
        let mut segments = vec!["project"];
        segments.extend(project_slug.split('/').filter(|s| !s.is_empty()));
        segments.extend([number.as_str(), "artifacts"]);
        let url = endpoint(&self.api_url, &segments)?;
        self.get_items(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(server: &mockito::Server, token: Option<&str>) -> CircleCiClient {
        let http = crate::outbound::build_client(Duration::from_secs(5)).unwrap();
        CircleCiClient::new(http, server.url(), token.map(str::to_string))
    }

    #[tokio::test]
    async fn test_list_workflow_jobs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/workflow/wf-1/job")
            .with_status(200)
            .with_body(
                r#"{"next_page_token": null, "items": [
                    {"id": "j1", "name": "lint", "project_slug": "gh/mattermost/p", "job_number": 10, "status": "success"},
                    {"id": "j2", "name": "plugin-ci/build", "project_slug": "gh/mattermost/p", "job_number": 11, "status": "success"},
                    {"id": "j3", "name": "approve", "status": "on_hold"}
                ]}"#,
            )
            .create_async()
            .await;

        let jobs = client(&server, None).list_workflow_jobs("wf-1").await.unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[1].name, "plugin-ci/build");
        assert_eq!(jobs[1].job_number, Some(11));
        assert_eq!(jobs[2].job_number, None);
    }

    #[tokio::test]
    async fn test_list_job_artifacts_keeps_slug_as_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/project/gh/mattermost/p/11/artifacts")
            .match_header("circle-token", "ci-secret")
            .with_status(200)
            .with_body(
                r#"{"items": [
                    {"path": "dist/p-1.0.0.tar.gz", "node_index": 0, "url": "https://output.circle-artifacts.com/0/dist/p-1.0.0.tar.gz"}
                ]}"#,
            )
            .create_async()
            .await;

        let artifacts = client(&server, Some("ci-secret"))
            .list_job_artifacts("gh/mattermost/p", 11)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(artifacts[0].path, "dist/p-1.0.0.tar.gz");
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/workflow/missing/job")
            .with_status(404)
            .with_body(r#"{"message": "Workflow not found"}"#)
            .create_async()
            .await;

        let err = client(&server, None).list_workflow_jobs("missing").await.unwrap_err();
        assert_eq!(err.to_string(), "CircleCI API error (404): Workflow not found");
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/workflow/wf/job")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client(&server, None).list_workflow_jobs("wf").await.unwrap_err();
        assert!(err.to_string().contains("unexpected response body"));
    }
}
