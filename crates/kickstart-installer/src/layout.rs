use std::path::{Path, PathBuf};

use kickstart_core::{InstallConfig, ReleaseRef};

/// Paths inside the install root used during one install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    archive_prefix: String,
    installed_marker: PathBuf,
    self_name: Option<String>,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, install: &InstallConfig) -> Self {
        Self {
            root: root.into(),
            archive_prefix: install.archive_prefix.clone(),
            installed_marker: install.installed_marker.clone(),
            self_name: install.self_name.clone(),
        }
    }

    pub fn with_self_name(mut self, self_name: impl Into<String>) -> Self {
        self.self_name = Some(self_name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_prefix(&self) -> &str {
        &self.archive_prefix
    }

    pub fn archive_path(&self, reference: &ReleaseRef) -> PathBuf {
        self.root
            .join(format!("{}{}.zip", self.archive_prefix, reference.as_str()))
    }

    pub fn staging_dir(&self, reference: &ReleaseRef) -> PathBuf {
        self.root
            .join(format!("{}{}", self.archive_prefix, reference.as_str()))
    }

    pub fn installed_marker_path(&self) -> PathBuf {
        self.root.join(&self.installed_marker)
    }

    pub fn is_installed(&self) -> bool {
        self.installed_marker_path().exists()
    }

    pub fn self_name(&self) -> Option<&str> {
        self.self_name.as_deref()
    }

    /// The installer's own file inside the root, if it has a name.
    pub fn self_path(&self) -> Option<PathBuf> {
        self.self_name.as_deref().map(|name| self.root.join(name))
    }

    pub fn is_self(&self, name: &str) -> bool {
        self.self_name.as_deref() == Some(name)
    }

    /// Archive left behind by an earlier, failed attempt.
    pub fn is_stale_archive(&self, name: &str) -> bool {
        name.starts_with(&self.archive_prefix) && name.ends_with(".zip")
    }
}
