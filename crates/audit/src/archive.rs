//! Recursive expansion of downloaded branch snapshots.

use std::fs::{self, File};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;

/// Expand every `.zip` file under `root` into a sibling directory named
/// after the archive without its extension. Returns the number of archives
/// expanded.
///
/// If the destination directory already exists the archive is skipped
/// entirely, so repeated runs over the same tree are no-ops. The original
/// archive is never deleted.
///
/// # Errors
///
/// Returns an error if the tree cannot be read or an archive is corrupt.
pub fn expand_tree(root: &Path) -> Result<usize> {
    let mut expanded = 0;
    expand_dir(root, &mut expanded)?;
    Ok(expanded)
}

fn expand_dir(dir: &Path, expanded: &mut usize) -> Result<()> {
    // Snapshot the listing up front so directories created by expansion
    // below are not traversed in the same pass.
    let entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            expand_dir(&path, expanded)?;
        } else if file_type.is_file() && entry.file_name().to_string_lossy().ends_with(".zip") {
            let destination = path.with_extension("");

            if destination.exists() {
                debug!(
                    archive = %path.display(),
                    "Expansion target already exists, skipping"
                );
                continue;
            }

            debug!(
                archive = %path.display(),
                destination = %destination.display(),
                "Expanding archive"
            );
            extract_archive(&path, &destination)?;
            *expanded += 1;
        }
    }

    Ok(())
}

/// Extract a single zip archive into `destination`.
fn extract_archive(archive_path: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination)?;

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(name = %entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let outpath = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;
        }
    }

    Ok(())
}
