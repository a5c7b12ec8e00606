use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use kickstart_core::{Failure, MessageKey, ReleaseRef, SourceConfig, MIN_ARCHIVE_BYTES};
use kickstart_remote::{Fetcher, ProgressFn};
use sha2::{Digest, Sha256};

use crate::fs_utils::{is_real_dir, is_symlink, remove_file_if_exists, symlinked_prefix};
use crate::layout::InstallLayout;
use crate::preflight::{ensure_extraction_available, ensure_writable};
use crate::types::DownloadReport;

/// Downloads the archive for `reference` to its fixed path in the root.
///
/// The file is kept on failure so a retry or a human can inspect it.
pub fn download_archive(
    layout: &InstallLayout,
    source: &SourceConfig,
    fetcher: &Fetcher,
    reference: &ReleaseRef,
    progress: &mut ProgressFn<'_>,
) -> Result<DownloadReport> {
    ensure_extraction_available()?;
    ensure_writable(layout.root())?;

    let archive_path = layout.archive_path(reference);
    if is_symlink(&archive_path) {
        tracing::warn!(path = %archive_path.display(), "replacing symlink at archive path");
        remove_file_if_exists(&archive_path).map_err(|_| {
            Failure::with_detail(MessageKey::FileOpenErr, archive_path.display().to_string())
        })?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(&archive_path)
        .map_err(|err| {
            tracing::warn!(path = %archive_path.display(), error = %err, "cannot open archive for writing");
            Failure::with_detail(MessageKey::FileOpenErr, archive_path.display().to_string())
        })?;

    let url = source.archive_url(reference.as_str());
    tracing::info!(%url, path = %archive_path.display(), "downloading archive");
    fetcher
        .download_to(&url, &mut file, progress)
        .map_err(|err| Failure::with_detail(MessageKey::CurlErr, format!("{err:#}")))?;
    drop(file);

    let bytes = fs::metadata(&archive_path).map(|meta| meta.len()).unwrap_or(0);
    if bytes < MIN_ARCHIVE_BYTES {
        tracing::warn!(bytes, minimum = MIN_ARCHIVE_BYTES, "downloaded archive is too small");
        return Err(Failure::new(MessageKey::DownloadFail).into());
    }

    let sha256 = sha256_file(&archive_path)?;
    tracing::info!(bytes, %sha256, "archive stored");
    Ok(DownloadReport {
        archive_path,
        bytes,
        sha256,
    })
}

/// Expands the downloaded archive into the root and returns the staging
/// directory it produced.
pub fn extract_archive(layout: &InstallLayout, reference: &ReleaseRef) -> Result<PathBuf> {
    ensure_extraction_available()?;
    ensure_writable(layout.root())?;

    let archive_path = layout.archive_path(reference);
    if !archive_path.is_file() {
        return Err(Failure::new(MessageKey::ZipNotFound).into());
    }

    let entries = unpack_zip(&archive_path, layout.root())?;
    tracing::info!(entries, archive = %archive_path.display(), "archive extracted");

    locate_staging_dir(layout, reference)
        .ok_or_else(|| Failure::new(MessageKey::ExtractDirErr).into())
}

/// The expected staging directory, or the first `<prefix>*` directory when
/// the host named it differently (tags lose their leading `v`, for one).
pub fn locate_staging_dir(layout: &InstallLayout, reference: &ReleaseRef) -> Option<PathBuf> {
    let expected = layout.staging_dir(reference);
    if is_real_dir(&expected) {
        return Some(expected);
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(layout.root())
        .ok()?
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(layout.archive_prefix()))
        })
        .map(|entry| entry.path())
        .filter(|path| is_real_dir(path))
        .collect();
    candidates.sort();
    let found = candidates.into_iter().next();
    if let Some(path) = &found {
        tracing::debug!(expected = %expected.display(), found = %path.display(), "using fallback staging directory");
    }
    found
}

/// Maps an archive entry name to a path relative to the extraction root.
/// `None` means the entry would land outside of it.
pub fn contained_entry_path(name: &str) -> Option<PathBuf> {
    if name.starts_with('/') || name.starts_with('\\') {
        return None;
    }
    let mut relative = PathBuf::new();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return None,
            _ => {}
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(component)), None) => relative.push(component),
            _ => return None,
        }
    }
    Some(relative)
}

#[cfg(feature = "zip")]
fn unpack_zip(archive_path: &Path, dst: &Path) -> Result<usize> {
    let unreadable = |err: &dyn std::fmt::Display| {
        tracing::warn!(archive = %archive_path.display(), error = %err, "cannot read archive");
        Failure::new(MessageKey::UnzipFail)
    };
    let file = File::open(archive_path).map_err(|err| unreadable(&err))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| unreadable(&err))?;

    // Validate every entry before the first byte is written.
    let mut planned = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(|err| unreadable(&err))?;
        let Some(relative) = contained_entry_path(entry.name()) else {
            tracing::warn!(entry = entry.name(), "archive entry escapes the install root");
            let name = entry.name().to_string();
            return Err(Failure::with_detail(MessageKey::UnzipFail, name).into());
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        if let Some(link) = symlinked_prefix(dst, &relative) {
            tracing::warn!(entry = entry.name(), link = %link.display(), "archive entry would be written through a symlink");
            let name = entry.name().to_string();
            return Err(Failure::with_detail(MessageKey::UnzipFail, name).into());
        }
        planned.push((index, relative));
    }

    for (index, relative) in &planned {
        let mut entry = archive.by_index(*index).map_err(|err| unreadable(&err))?;
        let outpath = dst.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&outpath)
                .with_context(|| format!("failed to create {}", outpath.display()))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut outfile = File::create(&outpath)
            .with_context(|| format!("failed to create {}", outpath.display()))?;
        io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("failed to write {}", outpath.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o777));
        }
    }

    Ok(planned.len())
}

#[cfg(not(feature = "zip"))]
fn unpack_zip(_archive_path: &Path, _dst: &Path) -> Result<usize> {
    Err(Failure::new(MessageKey::ZipMissing).into())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
