// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Deterministic deployment packaging.
//!
//! Archives a single file or a directory tree into a gzip-compressed tar.
//! Entries are sorted by their `/`-separated relative path and every header
//! field that depends on the local machine (mtime, owner, permissions beyond
//! the executable bit) is normalised, so unchanged source always produces
//! byte-identical packages.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::PackagingError;

/// Mode for regular files.
const FILE_MODE: u32 = 0o644;
/// Mode for files that carry any executable bit.
const EXECUTABLE_MODE: u32 = 0o755;

/// An archived function source tree, ready for upload.
#[derive(Debug, Clone)]
pub struct DeploymentPackage {
    bytes: Bytes,
    digest: String,
    entries: Vec<String>,
}

impl DeploymentPackage {
    /// The compressed archive.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Hex-encoded SHA-256 of the archive.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Archive entry names, in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A file selected for the archive.
struct SourceFile {
    /// Relative path with `/` separators.
    name: String,
    path: PathBuf,
    mode: u32,
}

/// Build a package from `source`, which may be a file or a directory.
///
/// Runs on the blocking pool; archiving touches the filesystem.
pub async fn build_package(source: &Path) -> Result<DeploymentPackage, PackagingError> {
    let source = source.to_owned();
    tokio::task::spawn_blocking(move || build_package_sync(&source))
        .await
        .map_err(|e| PackagingError::Io {
            context: "joining packaging task".to_string(),
            source: std::io::Error::other(e),
        })?
}

/// Synchronous variant of [`build_package`].
pub fn build_package_sync(source: &Path) -> Result<DeploymentPackage, PackagingError> {
    let metadata = fs::metadata(source).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PackagingError::SourceNotFound {
            path: source.to_path_buf(),
        },
        _ => PackagingError::Io {
            context: format!("reading metadata of {}", source.display()),
            source: e,
        },
    })?;

    let mut files = if metadata.is_dir() {
        let mut files = Vec::new();
        collect_files(source, source, &mut files)?;
        files
    } else {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PackagingError::SourceNotFound {
                path: source.to_path_buf(),
            })?;
        vec![SourceFile {
            name,
            path: source.to_path_buf(),
            mode: normalised_mode(&metadata),
        }]
    };

    if files.is_empty() {
        return Err(PackagingError::EmptySource {
            path: source.to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));

    let tar_data = write_tar(&files)?;
    let compressed = gzip(&tar_data)?;

    let digest = hex::encode(Sha256::digest(&compressed));
    let entries: Vec<String> = files.into_iter().map(|f| f.name).collect();

    debug!(
        source = %source.display(),
        entries = entries.len(),
        uncompressed_size = tar_data.len(),
        compressed_size = compressed.len(),
        digest = %digest,
        "built deployment package"
    );

    Ok(DeploymentPackage {
        bytes: Bytes::from(compressed),
        digest,
        entries,
    })
}

fn collect_files(
    root: &Path,
    dir: &Path,
    files: &mut Vec<SourceFile>,
) -> Result<(), PackagingError> {
    let read_dir = fs::read_dir(dir).map_err(|e| PackagingError::Io {
        context: format!("listing {}", dir.display()),
        source: e,
    })?;

    for entry in read_dir {
        let entry = entry.map_err(|e| PackagingError::Io {
            context: format!("listing {}", dir.display()),
            source: e,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| PackagingError::Io {
            context: format!("reading file type of {}", path.display()),
            source: e,
        })?;

        if file_type.is_symlink() {
            warn!(path = %path.display(), "skipping symlink in function source");
            continue;
        }

        if file_type.is_dir() {
            collect_files(root, &path, files)?;
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|e| PackagingError::Io {
                context: format!("reading metadata of {}", path.display()),
                source: e,
            })?;
            files.push(SourceFile {
                name: archive_name(root, &path),
                mode: normalised_mode(&metadata),
                path,
            });
        }
    }

    Ok(())
}

/// Relative path of `path` under `root`, joined with `/` on every platform.
fn archive_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn normalised_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        EXECUTABLE_MODE
    } else {
        FILE_MODE
    }
}

#[cfg(not(unix))]
fn normalised_mode(_metadata: &fs::Metadata) -> u32 {
    FILE_MODE
}

fn write_tar(files: &[SourceFile]) -> Result<Vec<u8>, PackagingError> {
    let mut builder = tar::Builder::new(Vec::new());

    for file in files {
        let data = fs::read(&file.path).map_err(|e| PackagingError::Io {
            context: format!("reading {}", file.path.display()),
            source: e,
        })?;

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(file.mode);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        builder
            .append_data(&mut header, &file.name, data.as_slice())
            .map_err(|e| PackagingError::Io {
                context: format!("archiving {}", file.name),
                source: e,
            })?;
    }

    builder.into_inner().map_err(|e| PackagingError::Io {
        context: "finishing tar archive".to_string(),
        source: e,
    })
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, PackagingError> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::default());

    encoder.write_all(data).map_err(|e| PackagingError::Io {
        context: "compressing archive".to_string(),
        source: e,
    })?;

    encoder.finish().map_err(|e| PackagingError::Io {
        context: "compressing archive".to_string(),
        source: e,
    })
}
