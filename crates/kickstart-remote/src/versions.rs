use base64::Engine;
use kickstart_core::{Channel, ChannelVersions, SourceConfig, VersionSet};
use serde_json::Value;

use crate::fetcher::Fetcher;

/// Best-effort lookup of the newest master/dev versions and the tag list.
///
/// Order: tags API for master, raw manifest for master (only if the tags gave
/// nothing) and for dev, then the contents API for whatever is still missing.
pub fn resolve_versions(fetcher: &Fetcher, source: &SourceConfig) -> VersionSet {
    let tags = fetch_tags(fetcher, source);
    let mut master = tags
        .first()
        .map(|tag| tag.trim_start_matches('v').to_string())
        .filter(|version| !version.is_empty());

    if master.is_none() {
        master = raw_manifest_version(fetcher, source, Channel::Master);
    }
    let mut dev = raw_manifest_version(fetcher, source, Channel::Dev);

    if master.is_none() {
        master = contents_version(fetcher, source, Channel::Master);
    }
    if dev.is_none() {
        dev = contents_version(fetcher, source, Channel::Dev);
    }

    tracing::info!(
        master = master.as_deref().unwrap_or("-"),
        dev = dev.as_deref().unwrap_or("-"),
        tags = tags.len(),
        "resolved versions"
    );

    VersionSet {
        versions: ChannelVersions { master, dev },
        tags,
    }
}

fn fetch_tags(fetcher: &Fetcher, source: &SourceConfig) -> Vec<String> {
    let body = fetcher.fetch(&source.tags_url());
    if body.is_empty() {
        return Vec::new();
    }
    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| entry.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn manifest_version(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("version")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(str::to_string)
}

fn raw_manifest_version(fetcher: &Fetcher, source: &SourceConfig, channel: Channel) -> Option<String> {
    manifest_version(&fetcher.fetch(&source.raw_manifest_url(channel.as_str())))
}

fn contents_version(fetcher: &Fetcher, source: &SourceConfig, channel: Channel) -> Option<String> {
    let body = fetcher.fetch(&source.contents_manifest_url(channel.as_str()));
    decode_contents_envelope(&body).and_then(|manifest| manifest_version(&manifest))
}

/// Unwraps the base64 `content` field of a contents API response. GitHub
/// wraps the payload at 60 columns, so whitespace is dropped first.
pub(crate) fn decode_contents_envelope(body: &[u8]) -> Option<Vec<u8>> {
    if body.is_empty() {
        return None;
    }
    let value: Value = serde_json::from_slice(body).ok()?;
    let encoded: String = value
        .get("content")
        .and_then(Value::as_str)?
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .ok()
}
