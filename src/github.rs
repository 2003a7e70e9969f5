use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, AppResult, Service};
use crate::outbound::{endpoint, read_json};
use crate::ports::{CheckRun, CodeHost, PullRequest, PullRequestSummary};

/// Repository search page size; the org has fewer plugin repos than this.
const REPO_SEARCH_PER_PAGE: &str = "100";

/// GitHub REST client. Authenticated when a token is configured, anonymous
/// (and much more rate limited) otherwise.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: Url) -> AppResult<T> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::network(Service::GitHub, &e))?;

        if let Some(err) = rate_limit_error(&response) {
            return Err(err);
        }
        read_json(Service::GitHub, response).await
    }

    fn search_url(&self, kind: &str, query: &str) -> AppResult<Url> {
        let mut url = endpoint(&self.api_url, &["search", kind])?;
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }
}

/// Parse a header value as a u64, returning None if missing or unparseable.
fn header_as_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response.headers().get(name)?.to_str().ok()?.parse().ok()
}

/// Detect GitHub rate limiting before the body is consumed.
/// 429 is always a rate limit; 403 is one when the primary quota is spent.
fn rate_limit_error(response: &reqwest::Response) -> Option<AppError> {
    let status = response.status().as_u16();
    let remaining = header_as_u64(response, "x-ratelimit-remaining");
    let reset_at = header_as_u64(response, "x-ratelimit-reset");
    let retry_after = header_as_u64(response, "retry-after");

    let limited = status == 429 || (status == 403 && remaining == Some(0));
    if !limited {
        return None;
    }
    let message = match (retry_after, reset_at) {
        (Some(secs), _) => format!("HTTP {status}, retry after {secs}s"),
        (None, Some(reset)) => format!("HTTP {status}, quota resets at epoch {reset}"),
        (None, None) => format!("HTTP {status}"),
    };
    Some(AppError::RateLimited {
        service: Service::GitHub,
        message,
    })
}

/// Search query for open PRs in one repository, with the caller's free text
/// appended.
pub(crate) fn pull_request_query(org: &str, repo: &str, text: &str) -> String {
    let base = format!("is:pr is:open repo:{org}/{repo}");
    match text.trim() {
        "" => base,
        text => format!("{base} {text}"),
    }
}

/// Keep names with the prefix, sorted, without duplicates. Search is fuzzy
/// and returns near matches, so the prefix is re-checked here.
pub(crate) fn filter_repo_names(names: impl IntoIterator<Item = String>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = names.into_iter().filter(|n| n.starts_with(prefix)).collect();
    names.sort();
    names.dedup();
    names
}

#[derive(Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct IssueItem {
    #[serde(default)]
    title: String,
    html_url: String,
}

#[derive(Deserialize)]
struct RepoItem {
    name: String,
}

#[derive(Deserialize)]
struct PullRequestResponse {
    head: HeadRef,
}

#[derive(Deserialize)]
struct HeadRef {
    sha: String,
}

#[derive(Deserialize)]
struct CheckRunsResponse {
    #[serde(default)]
    check_runs: Vec<CheckRun>,
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn search_pull_requests(
        &self,
        org: &str,
        repo: &str,
        query: &str,
    ) -> AppResult<Vec<PullRequestSummary>> {
        let url = self.search_url("issues", &pull_request_query(org, repo, query))?;
        let found: SearchResponse<IssueItem> = self.get(url).await?;
        Ok(found
            .items
            .into_iter()
            .map(|i| PullRequestSummary {
                title: i.title,
                html_url: i.html_url,
            })
            .collect())
    }

    async fn search_repositories(&self, org: &str, name_prefix: &str) -> AppResult<Vec<String>> {
        let mut url = self.search_url("repositories", &format!("org:{org} {name_prefix} in:name"))?;
        url.query_pairs_mut().append_pair("per_page", REPO_SEARCH_PER_PAGE);
        let found: SearchResponse<RepoItem> = self.get(url).await?;
        Ok(filter_repo_names(found.items.into_iter().map(|r| r.name), name_prefix))
    }

    async fn get_pull_request(&self, org: &str, repo: &str, number: u64) -> AppResult<PullRequest> {
        let number_segment = number.to_string();
        let url = endpoint(&self.api_url, &["repos", org, repo, "pulls", &number_segment])?;
        let pr: PullRequestResponse = self.get(url).await?;
        Ok(PullRequest { head_sha: pr.head.sha })
    }

    async fn list_check_runs(
        &self,
        org: &str,
        repo: &str,
        sha: &str,
        check_name: &str,
    ) -> AppResult<Vec<CheckRun>> {
        let mut url = endpoint(&self.api_url, &["repos", org, repo, "commits", sha, "check-runs"])?;
        url.query_pairs_mut().append_pair("check_name", check_name);
        let runs: CheckRunsResponse = self.get(url).await?;
        Ok(runs.check_runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn client(server: &mockito::Server, token: Option<&str>) -> GitHubClient {
        let http = crate::outbound::build_client(Duration::from_secs(5)).unwrap();
        GitHubClient::new(http, server.url(), token.map(str::to_string))
    }

    #[test]
    fn test_pull_request_query_appends_text() {
        assert_eq!(
            pull_request_query("mattermost", "mattermost-plugin-jira", " fix "),
            "is:pr is:open repo:mattermost/mattermost-plugin-jira fix"
        );
        assert_eq!(
            pull_request_query("mattermost", "mattermost-plugin-jira", ""),
            "is:pr is:open repo:mattermost/mattermost-plugin-jira"
        );
    }

    #[test]
    fn test_filter_repo_names_sorts_and_filters() {
        let names = vec![
            "mattermost-plugin-zoom".to_string(),
            "mattermost-server".to_string(),
            "mattermost-plugin-github".to_string(),
            "mattermost-plugin-github".to_string(),
        ];
        assert_eq!(
            filter_repo_names(names, "mattermost-plugin"),
            ["mattermost-plugin-github", "mattermost-plugin-zoom"]
        );
    }

    #[tokio::test]
    async fn test_search_pull_requests_sends_scoped_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/issues")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "is:pr is:open repo:mattermost/mattermost-plugin-jira webhook".into(),
            ))
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"total_count": 1, "items": [
                    {"title": "Fix webhook", "html_url": "https://github.com/mattermost/mattermost-plugin-jira/pull/7"}
                ]}"#,
            )
            .create_async()
            .await;

        let prs = client(&server, Some("secret"))
            .search_pull_requests("mattermost", "mattermost-plugin-jira", "webhook")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            prs,
            vec![PullRequestSummary {
                title: "Fix webhook".into(),
                html_url: "https://github.com/mattermost/mattermost-plugin-jira/pull/7".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_anonymous_client_sends_no_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r/pulls/42")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"number": 42, "head": {"sha": "abc123", "ref": "feature"}}"#)
            .create_async()
            .await;

        let pr = client(&server, None).get_pull_request("o", "r", 42).await.unwrap();
        mock.assert_async().await;
        assert_eq!(pr, PullRequest { head_sha: "abc123".into() });
    }

    #[tokio::test]
    async fn test_search_repositories_filters_prefix() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search/repositories")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "org:mattermost mattermost-plugin in:name".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"items": [
                    {"name": "mattermost-plugin-zoom"},
                    {"name": "mattermost-webapp"},
                    {"name": "mattermost-plugin-apps"}
                ]}"#,
            )
            .create_async()
            .await;

        let names = client(&server, None)
            .search_repositories("mattermost", "mattermost-plugin")
            .await
            .unwrap();
        assert_eq!(names, ["mattermost-plugin-apps", "mattermost-plugin-zoom"]);
    }

    #[tokio::test]
    async fn test_list_check_runs_filters_by_name() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/commits/abc123/check-runs")
            .match_query(Matcher::UrlEncoded("check_name".into(), "ci".into()))
            .with_status(200)
            .with_body(
                r#"{"total_count": 1, "check_runs": [
                    {"name": "ci", "external_id": "{\"workflow-id\":\"wf-1\"}"}
                ]}"#,
            )
            .create_async()
            .await;

        let runs = client(&server, None)
            .list_check_runs("o", "r", "abc123", "ci")
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].external_id.as_deref(), Some(r#"{"workflow-id":"wf-1"}"#));
    }

    #[tokio::test]
    async fn test_not_found_maps_to_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/pulls/9")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let err = client(&server, None).get_pull_request("o", "r", 9).await.unwrap_err();
        assert_eq!(err.to_string(), "GitHub API error (404): Not Found");
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/pulls/1")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "1700000000")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .create_async()
            .await;

        let err = client(&server, None).get_pull_request("o", "r", 1).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { service: Service::GitHub, .. }));
        assert!(err.to_string().contains("1700000000"));
    }

    #[tokio::test]
    async fn test_forbidden_with_quota_left_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/pulls/1")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "42")
            .with_body(r#"{"message": "Resource not accessible"}"#)
            .create_async()
            .await;

        let err = client(&server, None).get_pull_request("o", "r", 1).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 403, .. }));
    }
}
