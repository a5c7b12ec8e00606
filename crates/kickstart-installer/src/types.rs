use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub archive_path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub staging_dir: PathBuf,
    pub moved: Vec<String>,
    pub skipped_self: bool,
    /// Files whose move failed. Directory failures abort placement instead.
    pub failed_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStatus {
    pub required: Option<semver::VersionReq>,
    pub detected: Option<String>,
    pub satisfied: bool,
}

impl RuntimeStatus {
    pub fn unconstrained() -> Self {
        Self {
            required: None,
            detected: None,
            satisfied: true,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "requires {}, found {}",
            self.required
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "*".to_string()),
            self.detected.as_deref().unwrap_or("unknown")
        )
    }
}
