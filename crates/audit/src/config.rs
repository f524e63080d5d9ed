//! Configuration for the audit service.

use std::env;
use std::path::PathBuf;

/// Audit service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Base URL of the GitHub REST API.
    pub github_api_url: String,
    /// Directory under which per-query workspaces are created.
    pub work_root: PathBuf,
    /// Maximum number of branches processed concurrently per repository.
    pub branch_concurrency: usize,
    /// Ceiling on captured YAML file content, in bytes. Larger files are
    /// truncated at this boundary and flagged.
    pub yaml_max_bytes: u64,
    /// Timeout applied to the query endpoint (seconds).
    pub query_timeout_secs: u64,
    /// Fallback access token used when a query does not supply one.
    pub github_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("AUDIT_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4000),
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            work_root: env::var("AUDIT_WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("repo-audit")),
            branch_concurrency: env::var("AUDIT_BRANCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(4, |n: usize| n.max(1)),
            yaml_max_bytes: env::var("AUDIT_YAML_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_048_576),
            query_timeout_secs: env::var("AUDIT_QUERY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
        }
    }
}
