//! REST client for the primary bug tracker.
//!
//! Auth is an API key sent both as the `X-BUGZILLA-API-KEY` header and
//! the `api_key` query parameter; older deployments read one, newer
//! ones the other. Bug payloads arrive wrapped in a `{"bugs": [...]}`
//! envelope even when a single bug was addressed by id.

use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::links::{self, PullRequestLinks};
use crate::model::{Bug, ExternalBug, JiraRef};

const API_KEY_HEADER: &str = "X-BUGZILLA-API-KEY";

/// Errors raised while talking to the bug tracker.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("bug {0} not found")]
    NotFound(u32),

    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("expected exactly one bug in response, got {0}")]
    WrongCount(usize),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = core::result::Result<T, RequestError>;

/// Filters for a bug search. Statuses and target releases with more
/// than one entry match alternatively.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub classification: String,
    pub product: String,
    pub component: String,
    pub statuses: Vec<String>,
    pub target_releases: Vec<String>,
}

pub struct Client {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    github_hosts: Vec<String>,
    jira_trackers: Vec<String>,
}

impl Client {
    pub fn new(config: &Config, api_key: String) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: config.bugzilla.endpoint.trim_end_matches('/').to_string(),
            api_key,
            github_hosts: config.github.host_urls.clone(),
            jira_trackers: config.jira.tracker_urls.clone(),
        })
    }

    /// Fetches a single bug by id.
    pub async fn get_bug(&self, id: u32) -> Result<Bug> {
        let url = format!("{}/rest/bug/{id}", self.endpoint);
        let envelope: BugsEnvelope = self.get_json(url, &[], Some(id)).await?;
        single(envelope.bugs)
    }

    /// Fetches the raw external-tracker links recorded on a bug. The
    /// response can aggregate links belonging to other bugs; callers
    /// filter by bug id.
    pub async fn external_bugs(&self, id: u32) -> Result<Vec<ExternalBug>> {
        let url = format!("{}/rest/bug/{id}", self.endpoint);
        let params = [("include_fields", "external_bugs".to_string())];
        let envelope: LinksEnvelope = self.get_json(url, &params, Some(id)).await?;
        Ok(single(envelope.bugs)?.external_bugs)
    }

    /// The GitHub pull requests linked to a bug, parsed and filtered.
    pub async fn pull_requests_on_bug(&self, id: u32) -> Result<PullRequestLinks> {
        let external = self.external_bugs(id).await?;
        Ok(links::github_pulls(id, &external, &self.github_hosts))
    }

    /// The foreign-tracker issues linked to a bug.
    pub async fn jira_issues_on_bug(&self, id: u32) -> Result<Vec<JiraRef>> {
        let external = self.external_bugs(id).await?;
        Ok(links::jira_issues(id, &external, &self.jira_trackers))
    }

    /// Searches for bugs matching `query`.
    pub async fn search_bugs(&self, query: &SearchQuery) -> Result<Vec<Bug>> {
        let url = format!("{}/rest/bug", self.endpoint);
        let mut params: Vec<(&str, String)> = vec![
            ("classification", query.classification.clone()),
            ("product", query.product.clone()),
            ("component", query.component.clone()),
        ];
        params.extend(query.statuses.iter().map(|s| ("bug_status", s.clone())));
        params.extend(
            query
                .target_releases
                .iter()
                .map(|t| ("target_release", t.clone())),
        );

        let envelope: BugsEnvelope = self.get_json(url, &params, None).await?;
        debug!("search matched {} bugs", envelope.bugs.len());
        Ok(envelope.bugs)
    }

    /// Replaces the internal whiteboard on a bug.
    pub async fn update_whiteboard(&self, id: u32, whiteboard: &str) -> Result<()> {
        let url = format!("{}/rest/bug/{id}", self.endpoint);
        debug!("PUT {url}");
        let response = self
            .http
            .put(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("api_key", self.api_key.as_str())])
            .json(&serde_json::json!({ "cf_internal_whiteboard": whiteboard }))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RequestError::NotFound(id));
        }
        if !response.status().is_success() {
            return Err(RequestError::Status {
                status: response.status(),
                url,
            });
        }
        Ok(())
    }

    async fn get_json<T>(&self, url: String, params: &[(&str, String)], bug: Option<u32>) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!("GET {url}");
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND
            && let Some(id) = bug
        {
            return Err(RequestError::NotFound(id));
        }
        if !response.status().is_success() {
            return Err(RequestError::Status {
                status: response.status(),
                url,
            });
        }
        Ok(response.json().await?)
    }
}

fn single<T>(mut bugs: Vec<T>) -> Result<T> {
    if bugs.len() != 1 {
        return Err(RequestError::WrongCount(bugs.len()));
    }
    Ok(bugs.remove(0))
}

#[derive(Debug, Deserialize)]
struct BugsEnvelope {
    bugs: Vec<Bug>,
}

#[derive(Debug, Deserialize)]
struct LinksEnvelope {
    bugs: Vec<LinkedBug>,
}

#[derive(Debug, Deserialize)]
struct LinkedBug {
    #[serde(default)]
    external_bugs: Vec<ExternalBug>,
}
