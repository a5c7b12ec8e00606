use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use kickstart_core::{Failure, MessageKey};

use crate::fs_utils::{remove_file_if_exists, remove_tree_tolerant};
use crate::layout::InstallLayout;
use crate::types::PlacementReport;

/// Moves every top-level entry of `staging_dir` into the install root,
/// replacing whatever is already there, then drops the staging directory and
/// `archive_path`.
///
/// A failed directory move aborts with `move_fail`. A failed file move is
/// logged and recorded in the report but does not fail placement; the staging
/// directory is then kept so the file is not lost.
pub fn place_staged_entries(
    layout: &InstallLayout,
    staging_dir: &Path,
    archive_path: &Path,
) -> Result<PlacementReport> {
    place_staged_entries_with_mover(layout, staging_dir, archive_path, |src, dest| {
        fs::rename(src, dest)
    })
}

pub(crate) fn place_staged_entries_with_mover<MoveEntry>(
    layout: &InstallLayout,
    staging_dir: &Path,
    archive_path: &Path,
    mut move_entry: MoveEntry,
) -> Result<PlacementReport>
where
    MoveEntry: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut names: Vec<String> = fs::read_dir(staging_dir)
        .with_context(|| format!("failed to read {}", staging_dir.display()))?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut report = PlacementReport {
        staging_dir: staging_dir.to_path_buf(),
        ..PlacementReport::default()
    };

    for name in names {
        if layout.is_self(&name) {
            report.skipped_self = true;
            continue;
        }

        let src = staging_dir.join(&name);
        let dest = layout.root().join(&name);
        clear_destination(&dest);

        if let Err(err) = move_entry(&src, &dest) {
            if src.is_dir() {
                tracing::error!(entry = %name, error = %err, "failed moving directory into root");
                return Err(Failure::with_detail(MessageKey::MoveFail, name).into());
            }
            tracing::warn!(entry = %name, error = %err, "failed moving file into root, continuing");
            report.failed_files.push(name);
            continue;
        }
        report.moved.push(name);
    }

    if report.failed_files.is_empty() {
        if let Err(err) = fs::remove_dir_all(staging_dir) {
            tracing::debug!(path = %staging_dir.display(), error = %err, "could not remove staging directory");
        }
    } else {
        tracing::warn!(
            path = %staging_dir.display(),
            files = %report.failed_files.join(", "),
            "keeping staging directory with unmoved files"
        );
    }
    if let Err(err) = remove_file_if_exists(archive_path) {
        tracing::debug!(path = %archive_path.display(), error = %err, "could not remove archive");
    }

    tracing::info!(
        moved = report.moved.len(),
        failed_files = report.failed_files.len(),
        "placed package into root"
    );
    Ok(report)
}

fn clear_destination(dest: &Path) {
    let Ok(meta) = dest.symlink_metadata() else {
        return;
    };
    if meta.is_dir() {
        let failures = remove_tree_tolerant(dest);
        if failures > 0 {
            tracing::warn!(path = %dest.display(), failures, "existing directory only partly removed");
        }
    } else if let Err(err) = fs::remove_file(dest) {
        tracing::warn!(path = %dest.display(), error = %err, "could not remove existing file");
    }
}
