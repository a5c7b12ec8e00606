use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use kickstart_core::{Failure, MessageKey, RuntimeConfig};
use semver::Version;

use crate::types::RuntimeStatus;

pub fn extraction_available() -> bool {
    cfg!(feature = "zip")
}

pub fn ensure_extraction_available() -> Result<()> {
    if !extraction_available() {
        return Err(Failure::new(MessageKey::ZipMissing).into());
    }
    Ok(())
}

/// Checks writability by creating and removing a scratch file.
pub fn ensure_writable(root: &Path) -> Result<()> {
    let scratch = root.join(format!(".kickstart-write-check-{}", std::process::id()));
    let written = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&scratch)
        .and_then(|mut file| file.write_all(b"ok"));
    if let Err(err) = fs::remove_file(&scratch) {
        tracing::debug!(path = %scratch.display(), error = %err, "could not remove write check file");
    }
    if let Err(err) = written {
        tracing::warn!(root = %root.display(), error = %err, "install root is not writable");
        return Err(Failure::new(MessageKey::DirNotWritable).into());
    }
    Ok(())
}

pub fn detect_runtime(config: &RuntimeConfig) -> RuntimeStatus {
    let Some(required) = config.min_version.clone() else {
        return RuntimeStatus::unconstrained();
    };

    let detected = match run_version_command(&config.version_command) {
        Ok(output) => Some(output),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "runtime version command failed");
            None
        }
    };
    let satisfied = detected
        .as_deref()
        .and_then(parse_runtime_version)
        .is_some_and(|version| required.matches(&version));

    RuntimeStatus {
        required: Some(required),
        detected,
        satisfied,
    }
}

fn run_version_command(command_line: &[String]) -> Result<String> {
    let (program, args) = command_line
        .split_first()
        .ok_or_else(|| anyhow!("runtime version command is empty"))?;
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed launching runtime version command: {program}"))?;
    if !output.status.success() {
        return Err(anyhow!(
            "runtime version command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Reads the leading `major[.minor[.patch]]` of a runtime version string,
/// ignoring distro suffixes such as `8.1.2-1ubuntu2.14`.
pub fn parse_runtime_version(raw: &str) -> Option<Version> {
    let numeric: String = raw
        .trim()
        .trim_start_matches(['v', 'V'])
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    let mut parts = numeric
        .split('.')
        .filter(|part| !part.is_empty())
        .map(str::parse::<u64>);
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}
