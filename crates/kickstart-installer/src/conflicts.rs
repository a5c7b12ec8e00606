use std::fs;

use anyhow::{Context, Result};
use kickstart_core::{sort_entries, EntryKind, FileEntry};

use crate::layout::InstallLayout;

/// Entries already in the install root that an install could overwrite.
/// Skips the installer itself and archives from earlier attempts.
pub fn list_conflicts(layout: &InstallLayout) -> Result<Vec<FileEntry>> {
    let root = layout.root();
    let mut entries = Vec::new();
    let listing =
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?;
    for entry in listing {
        let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if layout.is_self(&name) || layout.is_stale_archive(&name) {
            continue;
        }
        let kind = if entry.path().is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        entries.push(FileEntry::new(name, kind));
    }
    sort_entries(&mut entries);
    Ok(entries)
}
