// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout and name rules for the certificate file tree.

use std::path::{Path, PathBuf};

use super::{StorageError, StorageResult};

/// Default root directory for uploaded documents.
pub const UPLOAD_ROOT: &str = "./uploads";

/// Hidden directory under the root where uploads are written before being
/// moved into place.
pub const STAGING_DIR: &str = ".staging";

/// Longest accepted identity or folder name, in bytes.
pub const MAX_COMPONENT_LEN: usize = 255;

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
///
/// A leading `.` also becomes `_`: stored names are never hidden entries
/// and never name a relative directory. An empty name becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .enumerate()
        .map(|(i, c)| match c {
            '.' if i == 0 => '_',
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' => c,
            _ => '_',
        })
        .collect();

    if safe.is_empty() {
        "_".to_string()
    } else {
        safe
    }
}

/// Check that an identity or folder name is usable as a single directory
/// component under the upload root.
pub fn validate_component<'a>(kind: &'static str, value: &'a str) -> StorageResult<&'a str> {
    let invalid = |reason: &str| StorageError::InvalidComponent {
        kind,
        reason: reason.to_string(),
    };

    if value.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_COMPONENT_LEN {
        return Err(invalid("is too long"));
    }
    if value.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(invalid("must not contain path separators"));
    }

    Ok(value)
}

/// Storage path utilities for the upload tree.
///
/// ```text
/// {root}/
///   .staging/{uuid}.part
///   {identity}/
///     {folder}/
///       {sanitized file name}
/// ```
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(UPLOAD_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the upload tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding in-flight uploads.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Path of a staging file.
    pub fn staging_file(&self, upload_id: &str) -> PathBuf {
        self.staging_dir().join(format!("{upload_id}.part"))
    }

    /// Directory holding all folders of one issuer.
    pub fn identity_dir(&self, identity: &str) -> PathBuf {
        self.root.join(identity)
    }

    /// Directory for one folder of an issuer.
    pub fn folder_dir(&self, identity: &str, folder: &str) -> PathBuf {
        self.identity_dir(identity).join(folder)
    }

    /// Absolute location of a stored file. `file_name` must already be sanitized.
    pub fn file_path(&self, identity: &str, folder: &str, file_name: &str) -> PathBuf {
        self.folder_dir(identity, folder).join(file_name)
    }

    /// Root-relative path recorded in certificate metadata. Always `/`-separated.
    pub fn relative_path(identity: &str, folder: &str, file_name: &str) -> String {
        format!("{identity}/{folder}/{file_name}")
    }

    /// Resolve a root-relative path produced by [`StoragePaths::relative_path`].
    pub fn resolve_relative(&self, relative: &str) -> StorageResult<PathBuf> {
        let parts: Vec<&str> = relative.split('/').collect();
        if parts.len() != 3 {
            return Err(StorageError::InvalidComponent {
                kind: "path",
                reason: format!("'{relative}' is not identity/folder/file"),
            });
        }

        for part in &parts {
            validate_component("path", part)?;
        }

        Ok(self.file_path(parts[0], parts[1], parts[2]))
    }
}
