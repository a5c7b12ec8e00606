use std::fs;

use anyhow::Result;
use kickstart_core::{Failure, MessageKey};

use crate::layout::InstallLayout;

/// Deletes the installer's own file from the root. Succeeds when the file is
/// already gone; fails only if it is still present afterwards.
pub fn remove_installer(layout: &InstallLayout) -> Result<()> {
    let Some(path) = layout.self_path() else {
        tracing::debug!("installer is not inside the install root, nothing to remove");
        return Ok(());
    };

    if path.symlink_metadata().is_ok() {
        if let Err(err) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %err, "could not remove installer");
        }
    }

    if path.symlink_metadata().is_ok() {
        let name = layout.self_name().unwrap_or_default().to_string();
        return Err(Failure::with_detail(MessageKey::DeleteFail, name).into());
    }
    tracing::info!(path = %path.display(), "installer removed");
    Ok(())
}
