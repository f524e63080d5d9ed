//! Branch tree scanning: file statistics and YAML capture.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;

/// Statistics collected from one expanded branch directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStats {
    /// Number of regular files under the branch root.
    pub total_files: u64,
    /// Sum of file sizes in bytes.
    pub total_size: u64,
    /// Number of files matching the YAML suffix.
    pub yaml_file_count: u64,
    /// Captured YAML files, in traversal order.
    pub yaml_files: Vec<YamlFile>,
}

/// A YAML file captured during scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YamlFile {
    pub name: String,
    /// Path relative to the branch root.
    pub relative_path: String,
    pub content: String,
    /// True if the content was cut at the capture ceiling.
    pub truncated: bool,
}

/// Scan a branch directory, counting files, summing sizes and capturing
/// the contents of `.yml`/`.yaml` files (case-sensitive suffix match).
///
/// Content capture is bounded by `yaml_max_bytes`; larger files are still
/// counted but their content is truncated at the ceiling and flagged.
///
/// # Errors
///
/// Returns an error if the directory cannot be traversed or a captured
/// file cannot be read.
pub fn scan_branch(root: &Path, yaml_max_bytes: u64) -> Result<BranchStats> {
    let mut stats = BranchStats::default();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let size = entry.metadata()?.len();
        stats.total_files += 1;
        stats.total_size += size;

        let name = entry.file_name().to_string_lossy();
        if name.ends_with(".yml") || name.ends_with(".yaml") {
            stats.yaml_file_count += 1;

            let relative_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            let (content, truncated) = read_capped(entry.path(), size, yaml_max_bytes)?;

            stats.yaml_files.push(YamlFile {
                name: name.into_owned(),
                relative_path,
                content,
                truncated,
            });
        }
    }

    debug!(
        root = %root.display(),
        total_files = stats.total_files,
        total_size = stats.total_size,
        yaml_files = stats.yaml_file_count,
        "Scanned branch directory"
    );

    Ok(stats)
}

/// Read a file's content as UTF-8 (lossy), cutting it at `cap` bytes.
fn read_capped(path: &Path, size: u64, cap: u64) -> Result<(String, bool)> {
    if size <= cap {
        let bytes = fs::read(path)?;
        return Ok((String::from_utf8_lossy(&bytes).into_owned(), false));
    }

    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(usize::try_from(cap).unwrap_or(usize::MAX));
    file.take(cap).read_to_end(&mut buffer)?;
    Ok((String::from_utf8_lossy(&buffer).into_owned(), true))
}
