//! GitHub repository audit service.
//!
//! This crate provides:
//! - REST client for the GitHub API (repositories, branches, zip snapshots, webhooks)
//! - Recursive expansion of downloaded branch snapshots
//! - Branch tree scanning with YAML content capture
//! - Per-query aggregation in isolated working directories
//! - HTTP server exposing the audit query endpoint

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Many async API methods can fail

pub mod aggregate;
pub mod archive;
pub mod config;
pub mod error;
pub mod github;
pub mod scan;
pub mod server;

pub use aggregate::{run_audit, AggregatedRepository, BranchReport};
pub use config::Config;
pub use error::{AuditError, Result};
pub use github::GitHubClient;
pub use scan::{BranchStats, YamlFile};
pub use server::{build_router, AppState};
