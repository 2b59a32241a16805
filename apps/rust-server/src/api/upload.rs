// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multipart form parsing for document uploads.
//!
//! File fields are consumed chunk by chunk, never buffered whole: for
//! registration into a [`StagedFile`], for verification straight into a
//! hasher. Staging file writes run on the blocking pool.

use axum::extract::{multipart::MultipartError, Multipart};

use super::run_blocking;
use crate::error::ApiError;
use crate::hashing::StreamingHasher;
use crate::storage::{FileStorage, StagedFile};

/// Name of the multipart field carrying the document.
pub const FILE_FIELD: &str = "file";

/// Name of the multipart field carrying the target folder.
pub const FOLDER_FIELD: &str = "folderName";

/// A file field written to the staging area.
pub struct UploadedFile {
    pub file_name: String,
    pub staged: StagedFile,
}

/// Parsed `POST /api/register` form.
#[derive(Default)]
pub struct RegisterForm {
    pub file: Option<UploadedFile>,
    pub folder_name: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    tracing::warn!(error = %err, "Multipart parsing error");
    ApiError::new(err.status(), err.body_text())
}

/// Read the registration form, staging the file as it arrives.
pub async fn read_register_form(
    multipart: &mut Multipart,
    files: &FileStorage,
) -> Result<RegisterForm, ApiError> {
    let mut form = RegisterForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            FILE_FIELD if form.file.is_none() => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let storage = files.clone();
                let mut staged = run_blocking(move || Ok(storage.stage()?)).await?;

                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    staged = run_blocking(move || {
                        staged.write_chunk(&chunk)?;
                        Ok(staged)
                    })
                    .await?;
                }

                form.file = Some(UploadedFile { file_name, staged });
            }
            FOLDER_FIELD => {
                form.folder_name = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {
                tracing::warn!(field = %field_name, "Ignoring multipart field");
            }
        }
    }

    Ok(form)
}

/// Hash the `file` field of a verification form without storing it.
///
/// Returns `None` when the form has no file field.
pub async fn hash_file_field(multipart: &mut Multipart) -> Result<Option<StreamingHasher>, ApiError> {
    let mut hasher = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) || hasher.is_some() {
            tracing::warn!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let mut current = StreamingHasher::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            current.update(&chunk);
        }
        hasher = Some(current);
    }

    Ok(hasher)
}
