use serde::{Deserialize, Serialize};

/// The wizard state a client should move to after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Init,
    Extract,
    Done,
    Error,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Extract => "extract",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

/// `{success, message, step}` envelope returned by every state-changing
/// action. A failed outcome always carries a non-empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
}

impl ActionOutcome {
    pub fn advance(message: impl Into<String>, step: Step) -> Self {
        Self {
            success: true,
            message: message.into(),
            step: Some(step),
        }
    }

    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
            step: None,
        }
    }

    pub fn failed(message: impl Into<String>, step: Option<Step>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "Unknown error occurred".to_string();
        }
        Self {
            success: false,
            message,
            step,
        }
    }

    pub fn next_step(&self) -> Option<Step> {
        if self.success {
            self.step
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "dir")]
    Directory,
    #[serde(rename = "file")]
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Directories first, then case-insensitive name order. Exact name breaks
/// ties so the order is total.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|left, right| {
        left.kind
            .cmp(&right.kind)
            .then_with(|| left.name.to_lowercase().cmp(&right.name.to_lowercase()))
            .then_with(|| left.name.cmp(&right.name))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesReport {
    pub success: bool,
    pub has_files: bool,
    pub files: Vec<FileEntry>,
}

impl FilesReport {
    pub fn from_entries(files: Vec<FileEntry>) -> Self {
        Self {
            success: true,
            has_files: !files.is_empty(),
            files,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVersions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
}

/// Whatever the version lookup managed to resolve. Missing values are
/// normal, not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSet {
    pub versions: ChannelVersions,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsReport {
    pub success: bool,
    #[serde(flatten)]
    pub set: VersionSet,
}
