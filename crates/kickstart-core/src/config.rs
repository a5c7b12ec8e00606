use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use semver::VersionReq;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "kickstart.toml";

/// Downloads smaller than this are treated as truncated or error pages.
pub const MIN_ARCHIVE_BYTES: u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KickstartConfig {
    pub package: PackageConfig,
    pub source: SourceConfig,
    pub install: InstallConfig,
    pub network: NetworkConfig,
    pub runtime: RuntimeConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    /// Where the operator is sent once extraction is done.
    pub handoff_url: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: "ProcessWire".to_string(),
            handoff_url: "./install.php".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,
    pub api_base: String,
    pub raw_base: String,
    pub archive_base: String,
    pub manifest_file: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            owner: "processwire".to_string(),
            repo: "processwire".to_string(),
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            archive_base: "https://github.com".to_string(),
            manifest_file: "package.json".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn tags_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/tags",
            trim_base(&self.api_base),
            self.owner,
            self.repo
        )
    }

    pub fn raw_manifest_url(&self, channel: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            trim_base(&self.raw_base),
            self.owner,
            self.repo,
            channel,
            self.manifest_file
        )
    }

    pub fn contents_manifest_url(&self, channel: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            trim_base(&self.api_base),
            self.owner,
            self.repo,
            self.manifest_file,
            channel
        )
    }

    pub fn archive_url(&self, reference: &str) -> String {
        format!(
            "{}/{}/{}/archive/{}.zip",
            trim_base(&self.archive_base),
            self.owner,
            self.repo,
            reference
        )
    }
}

fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    /// Install root. Relative paths resolve against the working directory.
    pub root: Option<PathBuf>,
    pub archive_prefix: String,
    pub installed_marker: PathBuf,
    /// File name treated as the installer itself. Defaults to the running
    /// executable's name.
    pub self_name: Option<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            root: None,
            archive_prefix: "processwire-".to_string(),
            installed_marker: PathBuf::from("site/assets/installed.php"),
            self_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub user_agent: String,
    pub download_user_agent: String,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
    /// Skip TLS certificate verification. Only for hosts with broken trust
    /// stores.
    pub insecure_tls: bool,
    pub curl_fallback: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "ProcessWire-Installer".to_string(),
            download_user_agent: "ProcessWire-Loader-Script".to_string(),
            metadata_timeout_secs: 5,
            download_timeout_secs: 300,
            insecure_tls: false,
            curl_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Command printing the runtime version, e.g. `["php", "-r", "echo PHP_VERSION;"]`.
    pub version_command: Vec<String>,
    pub min_version: Option<VersionReq>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl KickstartConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse kickstart config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Loads `path` when given, else `<root>/kickstart.toml` if it exists,
    /// else defaults.
    pub fn discover(explicit: Option<&Path>, root: &Path) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("source.owner", &self.source.owner),
            ("source.repo", &self.source.repo),
            ("install.archive_prefix", &self.install.archive_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
            if value.contains('/') || value.contains('\\') {
                return Err(anyhow!("{field} must not contain path separators: {value}"));
            }
        }
        if self.network.metadata_timeout_secs == 0 || self.network.download_timeout_secs == 0 {
            return Err(anyhow!("network timeouts must be greater than zero"));
        }
        if self.runtime.min_version.is_some() && self.runtime.version_command.is_empty() {
            return Err(anyhow!("runtime.min_version requires runtime.version_command"));
        }
        if self.install.installed_marker.is_absolute() {
            return Err(anyhow!(
                "install.installed_marker must be relative to the install root"
            ));
        }
        Ok(())
    }
}
