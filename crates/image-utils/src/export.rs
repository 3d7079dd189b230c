//! Export of build output to a directory, file, or stdout.

// This module uses unsafe for the libc effective-uid query.
#![allow(unsafe_code)]

use flate2::read::GzDecoder;
use std::fs::{DirBuilder, File};
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

use crate::{Error, Result};

/// Fallback when `TMPDIR` is unset or empty.
const DEFAULT_TEMP_DIR: &str = "/var/tmp";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Destination options for [`export_from_reader`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Destination path; resolved to an absolute path before use.
    pub path: PathBuf,
    /// Unpack the stream as a tar archive into a directory at `path`.
    pub is_dir: bool,
    /// Copy raw bytes to stdout instead of a file. Ignored when `is_dir`.
    pub is_stdout: bool,
    /// Keep the ownership recorded in archive entries when unpacking.
    ///
    /// Derived once at the call boundary, normally from [`is_privileged`]:
    /// a privileged caller already has access to the artifacts and keeps
    /// the recorded owners, an unprivileged one strips them so the
    /// unpacked tree stays accessible to the invoking user.
    pub preserve_ownership: bool,
}

impl ExportOptions {
    /// Options for unpacking into a directory, with the ownership decision
    /// taken from the current process's privileges.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            is_stdout: false,
            preserve_ownership: is_privileged(),
        }
    }

    /// Options for writing the raw stream to a single file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            is_stdout: false,
            preserve_ownership: false,
        }
    }

    /// Options for copying the raw stream to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            path: PathBuf::from("-"),
            is_dir: false,
            is_stdout: true,
            preserve_ownership: false,
        }
    }
}

/// True when the effective uid is root.
///
/// Queried once at the call boundary; the result feeds
/// [`ExportOptions::preserve_ownership`] rather than being re-queried
/// mid-export.
#[must_use]
pub fn is_privileged() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Base for temporary directories on this host.
///
/// Honors a non-empty `TMPDIR` override, otherwise `/var/tmp`. The returned
/// path is not checked for existence or writability.
#[must_use]
pub fn temp_dir() -> PathBuf {
    match std::env::var("TMPDIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_TEMP_DIR),
    }
}

/// Read bytes from `input` and export them to a directory, file, or stdout.
///
/// The destination path is made absolute first; failing that is fatal for
/// the call. With `is_dir` the destination directory tree is created
/// (mode `0700`, pre-existing directories are fine) and the stream is
/// unpacked into it as a tar archive, transparently decompressing gzip
/// input. Otherwise the raw bytes are copied verbatim: to stdout (left
/// open for the caller) when `is_stdout`, or into a freshly created file
/// (truncating any existing one) whose handle is released on every exit
/// path.
///
/// Single-shot and blocking. On failure the destination state is
/// ambiguous; callers must not assume a partial result is usable.
///
/// # Errors
///
/// Each failure wraps the underlying cause together with the destination
/// path: [`Error::PathResolution`], [`Error::DirectoryCreation`],
/// [`Error::Untar`], [`Error::FileCreation`], or [`Error::Copy`].
pub fn export_from_reader(input: impl Read, opts: &ExportOptions) -> Result<()> {
    let path = absolute_path(&opts.path)?;
    debug!(
        path = %path.display(),
        is_dir = opts.is_dir,
        is_stdout = opts.is_stdout,
        "Exporting build output"
    );

    if opts.is_dir {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&path).map_err(|source| Error::DirectoryCreation {
            path: path.clone(),
            source,
        })?;
        untar(input, &path, opts.preserve_ownership)?;
    } else if opts.is_stdout {
        // Stdout belongs to the caller and is never closed here.
        let stdout = io::stdout();
        let mut out = stdout.lock();
        copy_stream(input, &mut out, &path)?;
        out.flush()
            .map_err(|source| Error::Copy { path, source })?;
    } else {
        let mut file = File::create(&path).map_err(|source| Error::FileCreation {
            path: path.clone(),
            source,
        })?;
        copy_stream(input, &mut file, &path)?;
    }
    Ok(())
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::path::absolute(path).map_err(|source| Error::PathResolution {
        path: path.to_path_buf(),
        source,
    })
}

fn untar(input: impl Read, dest: &Path, preserve_ownership: bool) -> Result<()> {
    let mut reader = io::BufReader::new(input);
    let compressed = reader
        .fill_buf()
        .map_err(|source| Error::Untar {
            path: dest.to_path_buf(),
            source,
        })?
        .starts_with(&GZIP_MAGIC);

    if compressed {
        unpack_archive(GzDecoder::new(reader), dest, preserve_ownership)
    } else {
        unpack_archive(reader, dest, preserve_ownership)
    }
}

fn unpack_archive(input: impl Read, dest: &Path, preserve_ownership: bool) -> Result<()> {
    let mut archive = Archive::new(input);
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(preserve_ownership);
    archive.unpack(dest).map_err(|source| Error::Untar {
        path: dest.to_path_buf(),
        source,
    })
}

fn copy_stream(mut input: impl Read, output: &mut impl Write, path: &Path) -> Result<()> {
    io::copy(&mut input, output).map_err(|source| Error::Copy {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
