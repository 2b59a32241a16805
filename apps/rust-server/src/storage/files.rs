// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local file storage for uploaded documents.
//!
//! Uploads are streamed into a staging file under `{root}/.staging` while
//! being hashed, then renamed to `{root}/{identity}/{folder}/{name}`.
//! A later upload with the same sanitized name in the same folder replaces
//! the earlier file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::hashing::StreamingHasher;

use super::paths::{sanitize_file_name, validate_component, StoragePaths};

/// Error type for file storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to store empty file {0}")]
    EmptyFile(String),

    #[error("Invalid {kind}: {reason}")]
    InvalidComponent { kind: &'static str, reason: String },

    #[error("Failed to store file '{file}' for '{identity}' in folder '{folder}': {source}")]
    Write {
        file: String,
        identity: String,
        folder: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    paths: StoragePaths,
}

impl FileStorage {
    /// Open the storage, creating the root and staging directories if absent.
    pub fn open(paths: StoragePaths) -> StorageResult<Self> {
        fs::create_dir_all(paths.root())?;
        fs::create_dir_all(paths.staging_dir())?;
        Ok(Self { paths })
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Write-read-delete probe against the upload root.
    pub fn health_check(&self) -> StorageResult<()> {
        let probe = self.paths.staging_dir().join(".health_check");
        let data = b"health_check_data";

        fs::write(&probe, data)?;
        let read_back = fs::read(&probe)?;
        fs::remove_file(&probe)?;

        if read_back != data {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "health check data mismatch",
            )));
        }
        Ok(())
    }

    /// Root-relative path a document will be stored under.
    pub fn relative_path(
        &self,
        identity: &str,
        folder: &str,
        original_name: &str,
    ) -> StorageResult<String> {
        validate_component("identity", identity)?;
        validate_component("folder", folder)?;
        Ok(StoragePaths::relative_path(
            identity,
            folder,
            &sanitize_file_name(original_name),
        ))
    }

    /// Open a new staging file. Bytes written to it are hashed on the way.
    pub fn stage(&self) -> StorageResult<StagedFile> {
        let upload_id = uuid::Uuid::new_v4().to_string();
        let staging_path = self.paths.staging_file(&upload_id);
        fs::create_dir_all(self.paths.staging_dir())?;
        let file = File::create(&staging_path)?;

        Ok(StagedFile {
            paths: self.paths.clone(),
            staging_path,
            writer: Some(BufWriter::new(file)),
            hasher: StreamingHasher::new(),
            persisted: false,
        })
    }

    /// Copy a byte stream into `{identity}/{folder}/{sanitized name}`.
    ///
    /// Returns the root-relative path. Empty input is rejected and leaves
    /// nothing behind.
    pub fn store<R: Read>(
        &self,
        mut reader: R,
        original_name: &str,
        identity: &str,
        folder: &str,
    ) -> StorageResult<String> {
        let mut staged = self.stage()?;
        let mut buffer = [0u8; 8192];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            staged.write_chunk(&buffer[..n])?;
        }

        staged.persist(identity, folder, original_name)
    }

    /// Delete a stored file by its root-relative path. Missing files are ignored.
    pub fn remove(&self, relative_path: &str) -> StorageResult<()> {
        let path = self.paths.resolve_relative(relative_path)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Folder names of an issuer, sorted. Empty when the issuer has none.
    pub fn list_folders(&self, identity: &str) -> StorageResult<Vec<String>> {
        validate_component("identity", identity)?;
        list_entries(&self.paths.identity_dir(identity), |p| p.is_dir())
    }

    /// File names inside one folder of an issuer, sorted. Empty when absent.
    pub fn list_files(&self, identity: &str, folder: &str) -> StorageResult<Vec<String>> {
        validate_component("identity", identity)?;
        validate_component("folder", folder)?;
        list_entries(&self.paths.folder_dir(identity, folder), |p| p.is_file())
    }
}

/// Sorted names of the non-hidden entries of `dir` accepted by `keep`.
fn list_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> StorageResult<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !keep(&entry.path()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// An upload being written to the staging area.
///
/// Dropping a staged file that was never persisted deletes it.
pub struct StagedFile {
    paths: StoragePaths,
    staging_path: PathBuf,
    writer: Option<BufWriter<File>>,
    hasher: StreamingHasher,
    persisted: bool,
}

impl StagedFile {
    /// Append a chunk to the staging file.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            StorageError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "staged file already closed",
            ))
        })?;
        writer.write_all(chunk)?;
        self.hasher.update(chunk);
        Ok(())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> u64 {
        self.hasher.bytes_hashed()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 of everything written so far.
    pub fn document_hash(&self) -> String {
        self.hasher.clone().finalize()
    }

    /// Move the staged bytes to `{identity}/{folder}/{sanitized name}`,
    /// replacing any file already there. Returns the root-relative path.
    pub fn persist(
        mut self,
        identity: &str,
        folder: &str,
        original_name: &str,
    ) -> StorageResult<String> {
        validate_component("identity", identity)?;
        validate_component("folder", folder)?;

        if self.is_empty() {
            return Err(StorageError::EmptyFile(original_name.to_string()));
        }

        let write_error = |source: io::Error| StorageError::Write {
            file: original_name.to_string(),
            identity: identity.to_string(),
            folder: folder.to_string(),
            source,
        };

        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(write_error)?;
            let file = writer.into_inner().map_err(|e| write_error(e.into_error()))?;
            file.sync_all().map_err(write_error)?;
        }

        let safe_name = sanitize_file_name(original_name);
        let folder_dir = self.paths.folder_dir(identity, folder);
        fs::create_dir_all(&folder_dir).map_err(write_error)?;

        let destination = folder_dir.join(&safe_name);
        fs::rename(&self.staging_path, &destination).map_err(write_error)?;
        self.persisted = true;

        tracing::debug!(
            identity = %identity,
            folder = %folder,
            file = %safe_name,
            "Stored document"
        );

        Ok(StoragePaths::relative_path(identity, folder, &safe_name))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.persisted {
            self.writer.take();
            let _ = fs::remove_file(&self.staging_path);
        }
    }
}
