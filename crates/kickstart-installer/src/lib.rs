mod archive;
mod cleanup;
mod conflicts;
mod fs_utils;
mod layout;
mod placement;
mod preflight;
mod types;

use std::path::PathBuf;

use anyhow::Result;
use kickstart_core::{FileEntry, KickstartConfig, ReleaseRef, SourceConfig, VersionSet};
use kickstart_remote::{resolve_versions, Fetcher, ProgressFn};

pub use archive::{
    contained_entry_path, download_archive, extract_archive, locate_staging_dir, sha256_file,
};
pub use cleanup::remove_installer;
pub use conflicts::list_conflicts;
pub use fs_utils::{remove_file_if_exists, remove_tree_tolerant};
pub use layout::InstallLayout;
pub use placement::place_staged_entries;
pub use preflight::{
    detect_runtime, ensure_extraction_available, ensure_writable, extraction_available,
    parse_runtime_version,
};
pub use types::{DownloadReport, PlacementReport, RuntimeStatus};

/// Server-side operations of one install root.
pub struct Installer {
    layout: InstallLayout,
    source: SourceConfig,
    fetcher: Fetcher,
}

impl Installer {
    pub fn new(layout: InstallLayout, source: SourceConfig, fetcher: Fetcher) -> Self {
        Self {
            layout,
            source,
            fetcher,
        }
    }

    pub fn from_config(config: &KickstartConfig, root: impl Into<PathBuf>) -> Self {
        Self::new(
            InstallLayout::new(root, &config.install),
            config.source.clone(),
            Fetcher::from_config(&config.network),
        )
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn versions(&self) -> VersionSet {
        resolve_versions(&self.fetcher, &self.source)
    }

    pub fn check_files(&self) -> Result<Vec<FileEntry>> {
        list_conflicts(&self.layout)
    }

    pub fn download(
        &self,
        reference: &ReleaseRef,
        progress: &mut ProgressFn<'_>,
    ) -> Result<DownloadReport> {
        download_archive(&self.layout, &self.source, &self.fetcher, reference, progress)
    }

    pub fn extract(&self, reference: &ReleaseRef) -> Result<PlacementReport> {
        let staging_dir = extract_archive(&self.layout, reference)?;
        place_staged_entries(
            &self.layout,
            &staging_dir,
            &self.layout.archive_path(reference),
        )
    }

    pub fn cleanup(&self) -> Result<()> {
        remove_installer(&self.layout)
    }
}
