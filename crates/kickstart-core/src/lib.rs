mod config;
mod messages;
mod outcome;
mod release;
mod wizard;

pub use config::{
    InstallConfig, KickstartConfig, NetworkConfig, PackageConfig, RuntimeConfig, ServerConfig,
    SourceConfig, CONFIG_FILE_NAME, MIN_ARCHIVE_BYTES,
};
pub use messages::{Failure, Lang, MessageKey};
pub use outcome::{
    sort_entries, ActionOutcome, ChannelVersions, EntryKind, FileEntry, FilesReport, Step,
    VersionSet, VersionsReport,
};
pub use release::{is_version_tag, Channel, ReleaseRef};
pub use wizard::{InstallType, Phase, Wizard, WizardCommand, WizardEvent, WizardState};
