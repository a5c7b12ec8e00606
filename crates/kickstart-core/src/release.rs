use std::fmt;

use crate::messages::{Failure, MessageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Master,
    Dev,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Dev => "dev",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "master" => Some(Self::Master),
            "dev" => Some(Self::Dev),
            _ => None,
        }
    }
}

/// What the operator chose to install: a channel or a version tag.
///
/// The only constructor is [`ReleaseRef::parse`], so a value in hand is always
/// safe to splice into URLs and file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReleaseRef {
    Channel(Channel),
    Tag(String),
}

impl ReleaseRef {
    pub fn parse(input: &str) -> Result<Self, Failure> {
        if let Some(channel) = Channel::parse(input) {
            return Ok(Self::Channel(channel));
        }
        if is_version_tag(input) {
            return Ok(Self::Tag(input.to_string()));
        }
        Err(Failure::with_detail(MessageKey::InvalidBranch, input))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Channel(channel) => channel.as_str(),
            Self::Tag(tag) => tag,
        }
    }

    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::Channel(channel) => Some(*channel),
            Self::Tag(_) => None,
        }
    }
}

impl Default for ReleaseRef {
    fn default() -> Self {
        Self::Channel(Channel::Master)
    }
}

impl fmt::Display for ReleaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `[vV]?\d+(\.\d+)*(-[a-zA-Z0-9]+)?`.
pub fn is_version_tag(input: &str) -> bool {
    let body = input
        .strip_prefix('v')
        .or_else(|| input.strip_prefix('V'))
        .unwrap_or(input);

    let (numeric, suffix) = match body.split_once('-') {
        Some((numeric, suffix)) => (numeric, Some(suffix)),
        None => (body, None),
    };

    if numeric.is_empty()
        || numeric
            .split('.')
            .any(|group| group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()))
    {
        return false;
    }

    match suffix {
        None => true,
        Some(suffix) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_alphanumeric()),
    }
}
