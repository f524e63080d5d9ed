//! GitHub API client for the audit pipeline.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::redirect;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{AuditError, Result};

const GITHUB_API_URL: &str = "https://api.github.com";

/// GitHub API client used to enumerate and snapshot repositories.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    /// Separate client for zipball downloads: GitHub answers those with a
    /// redirect to a short-lived archive URL, and we follow exactly one.
    download_client: reqwest::Client,
    base_url: String,
    token: String,
}

/// A repository owned by the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(rename = "private")]
    pub is_private: bool,
}

/// Repository owner reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// A branch of a repository, as listed by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    pub name: String,
}

/// GitHub webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,
}

/// A webhook configured on a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: u64,
    pub name: String,
    pub active: bool,
    pub config: WebhookConfig,
}

impl GitHubClient {
    /// Create a new client for the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be created.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Create a client against a custom API base URL (GitHub Enterprise,
    /// local test servers).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be created.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("repo-audit/0.1"));

        let client = reqwest::Client::builder()
            .default_headers(headers.clone())
            .build()?;

        let download_client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::limited(1))
            .build()?;

        Ok(Self {
            client,
            download_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// List repositories owned by the authenticated user.
    ///
    /// An empty list is a valid outcome meaning "no repositories".
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or the response cannot be
    /// parsed.
    pub async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let url = format!("{}/user/repos", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuditError::Status {
                status: response.status(),
                context: "listing repositories".to_string(),
            });
        }

        Ok(response.json().await?)
    }

    /// List branches of a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_branches(&self, repo: &Repository) -> Result<Vec<BranchRef>> {
        let url = format!("{}/repos/{}/branches", self.base_url, repo.full_name);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuditError::Status {
                status: response.status(),
                context: format!("listing branches for {}", repo.full_name),
            });
        }

        Ok(response.json().await?)
    }

    /// List webhooks configured on a repository.
    ///
    /// An empty repository name short-circuits to an empty list without
    /// touching the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_webhooks(&self, full_name: &str) -> Result<Vec<Webhook>> {
        if full_name.is_empty() {
            debug!("No repository name, skipping webhook fetch");
            return Ok(Vec::new());
        }

        let url = format!("{}/repos/{full_name}/hooks", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuditError::Status {
                status: response.status(),
                context: format!("listing webhooks for {full_name}"),
            });
        }

        Ok(response.json().await?)
    }

    /// Download a branch's zip snapshot into `<dest_root>/<repo>/<branch>/`.
    ///
    /// GitHub responds with a redirect to the archive host; the download
    /// client follows exactly one. The file is named after the branch, with
    /// path separators flattened so the name stays a single path segment.
    /// On a stream error the partial file is removed before the error is
    /// propagated.
    ///
    /// # Errors
    ///
    /// Returns an error naming the status code on a non-success response,
    /// or an I/O error if the snapshot cannot be written.
    pub async fn download_branch_archive(
        &self,
        repo: &Repository,
        branch: &str,
        dest_root: &Path,
    ) -> Result<PathBuf> {
        let url = format!(
            "{}/repos/{}/zipball/{branch}",
            self.base_url, repo.full_name
        );

        let response = self
            .download_client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuditError::Status {
                status: response.status(),
                context: format!("downloading {}@{branch}", repo.full_name),
            });
        }

        let dir = dest_root.join(&repo.name).join(branch);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(archive_file_name(branch));
        if let Err(err) = write_body(response, &path).await {
            warn!(
                repo = %repo.full_name,
                branch = %branch,
                error = %err,
                "Snapshot download failed, removing partial file"
            );
            let _ = tokio::fs::remove_file(&path).await;
            return Err(err);
        }

        debug!(
            repo = %repo.full_name,
            branch = %branch,
            path = %path.display(),
            "Downloaded branch snapshot"
        );

        Ok(path)
    }
}

/// Stream a response body to a file on disk.
async fn write_body(response: reqwest::Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(())
}

/// File name for a branch snapshot. Branch names may contain `/`, which
/// must not introduce extra path segments.
fn archive_file_name(branch: &str) -> String {
    format!("{}.zip", branch.replace('/', "-"))
}
