//! Per-query orchestration: download, expand, scan and aggregate.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::Config;
use crate::error::Result;
use crate::github::{BranchRef, GitHubClient, Repository, Webhook};
use crate::scan::{self, BranchStats};

/// One branch's contribution to a repository report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchReport {
    pub name: String,
    #[serde(flatten)]
    pub stats: BranchStats,
}

/// Per-repository summary returned to the caller.
///
/// `total_size` and `total_files` are the sums of the corresponding fields
/// across `branches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: String,
    pub is_private: bool,
    pub total_size: u64,
    pub total_files: u64,
    pub branches: Vec<BranchReport>,
    pub webhooks: Vec<Webhook>,
}

/// Snapshot written into the query workspace once scanning is done.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    generated_at: DateTime<Utc>,
    repositories: &'a [AggregatedRepository],
}

/// Run one full audit for the client's token.
///
/// Every query gets a fresh workspace directory under `config.work_root`,
/// removed when the query finishes (on error too). Branches of one
/// repository are processed with bounded concurrency; results keep the
/// listing order. A repository whose branch listing fails is skipped; a
/// branch that fails to download, expand or scan is skipped while its
/// siblings continue. Webhook failures degrade to an empty list.
///
/// # Errors
///
/// Returns an error if the workspace cannot be created, the repository
/// listing fails, or the snapshot cannot be written.
pub async fn run_audit(
    client: &GitHubClient,
    config: &Config,
) -> Result<Vec<AggregatedRepository>> {
    fs::create_dir_all(&config.work_root)?;
    let workspace = tempfile::Builder::new()
        .prefix("audit-")
        .tempdir_in(&config.work_root)?;
    debug!(workspace = %workspace.path().display(), "Created query workspace");

    let repositories = client.list_repositories().await?;
    info!(count = repositories.len(), "Fetched repositories");

    let mut results = Vec::with_capacity(repositories.len());
    for repo in &repositories {
        let branches = match client.list_branches(repo).await {
            Ok(branches) => branches,
            Err(err) => {
                warn!(
                    repo = %repo.full_name,
                    error = %err,
                    "Failed to list branches, skipping repository"
                );
                continue;
            }
        };
        debug!(repo = %repo.full_name, count = branches.len(), "Fetched branches");

        let work_path = workspace.path();
        let reports: Vec<BranchReport> = stream::iter(branches)
            .map(|branch| async move {
                process_branch(client, repo, &branch, work_path, config).await
            })
            .buffered(config.branch_concurrency)
            .filter_map(|report| async move { report })
            .collect()
            .await;

        results.push(aggregate_repository(repo, reports));
    }

    // Webhooks are attached in a second pass once every repository has
    // been scanned.
    for entry in &mut results {
        entry.webhooks = match client.list_webhooks(&entry.full_name).await {
            Ok(hooks) => hooks,
            Err(err) => {
                warn!(
                    repo = %entry.full_name,
                    error = %err,
                    "Failed to fetch webhooks, defaulting to none"
                );
                Vec::new()
            }
        };
    }

    write_snapshot(workspace.path(), &results)?;

    info!(repositories = results.len(), "Audit complete");
    Ok(results)
}

/// Process one branch, turning any failure into a logged skip.
async fn process_branch(
    client: &GitHubClient,
    repo: &Repository,
    branch: &BranchRef,
    work_root: &Path,
    config: &Config,
) -> Option<BranchReport> {
    match audit_branch(client, repo, branch, work_root, config).await {
        Ok(stats) => Some(BranchReport {
            name: branch.name.clone(),
            stats,
        }),
        Err(err) => {
            warn!(
                repo = %repo.full_name,
                branch = %branch.name,
                error = %err,
                "Skipping branch"
            );
            None
        }
    }
}

/// Download, expand and scan a single branch.
async fn audit_branch(
    client: &GitHubClient,
    repo: &Repository,
    branch: &BranchRef,
    work_root: &Path,
    config: &Config,
) -> Result<BranchStats> {
    info!(repo = %repo.full_name, branch = %branch.name, "Processing branch");

    client
        .download_branch_archive(repo, &branch.name, work_root)
        .await?;

    // The branch directory holds the archive next to its expansion; both
    // count toward the scan totals.
    let branch_dir = work_root.join(&repo.name).join(&branch.name);
    archive::expand_tree(&branch_dir)?;
    scan::scan_branch(&branch_dir, config.yaml_max_bytes)
}

/// Combine branch reports into the per-repository summary.
fn aggregate_repository(repo: &Repository, branches: Vec<BranchReport>) -> AggregatedRepository {
    let total_size = branches.iter().map(|b| b.stats.total_size).sum();
    let total_files = branches.iter().map(|b| b.stats.total_files).sum();

    AggregatedRepository {
        id: repo.id,
        name: repo.name.clone(),
        full_name: repo.full_name.clone(),
        owner: repo.owner.login.clone(),
        is_private: repo.is_private,
        total_size,
        total_files,
        branches,
        webhooks: Vec::new(),
    }
}

/// Persist the transient JSON snapshot of this query's scan.
fn write_snapshot(workspace: &Path, repositories: &[AggregatedRepository]) -> Result<()> {
    let snapshot = Snapshot {
        generated_at: Utc::now(),
        repositories,
    };

    let path = workspace.join("audit-snapshot.json");
    fs::write(&path, serde_json::to_vec_pretty(&snapshot)?)?;
    debug!(path = %path.display(), "Wrote audit snapshot");

    Ok(())
}
