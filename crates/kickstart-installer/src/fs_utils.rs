use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub(crate) fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
}

pub(crate) fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|meta| meta.is_dir())
}

/// First existing prefix of `root/relative` that is a symlink. Missing
/// components end the walk since nothing below them exists yet.
#[cfg_attr(not(feature = "zip"), allow(dead_code))]
pub(crate) fn symlinked_prefix(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match current.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => return Some(current),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

/// Deletes a directory tree deepest-first, carrying on past entries that
/// cannot be removed. Returns how many removals failed.
pub fn remove_tree_tolerant(path: &Path) -> usize {
    let mut failures = 0;
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let child = entry.path();
            let is_dir = child
                .symlink_metadata()
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            if is_dir {
                failures += remove_tree_tolerant(&child);
            } else if let Err(err) = fs::remove_file(&child) {
                tracing::debug!(path = %child.display(), error = %err, "could not remove file");
                failures += 1;
            }
        }
    }
    if let Err(err) = fs::remove_dir(path) {
        tracing::debug!(path = %path.display(), error = %err, "could not remove directory");
        failures += 1;
    }
    failures
}
