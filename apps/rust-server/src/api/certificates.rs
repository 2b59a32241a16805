// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::Utc;

use super::run_blocking;
use super::upload::{hash_file_field, read_register_form};
use crate::{
    auth::Institution,
    error::ApiError,
    hashing::is_document_hash,
    models::{CertificateResponse, RegisterCertificateForm, VerifyDocumentForm, VerifyResponse},
    state::AppState,
    storage::{CertDatabase, CertificateRecord, FileStorage, MetadataError, StagedFile},
};

/// Insert the record and move the staged file into place in one metadata
/// transaction.
///
/// A failed move aborts the transaction. A failed commit after the move
/// deletes the moved file again.
fn commit_registration(
    db: &CertDatabase,
    files: &FileStorage,
    staged: StagedFile,
    record: &CertificateRecord,
) -> Result<(), ApiError> {
    let result = db.save_with(record, || {
        staged
            .persist(&record.issuer, &record.folder_name, &record.original_file_name)
            .map(|_| ())
    });

    match result {
        Ok(()) => Ok(()),
        Err(MetadataError::RedbCommit(err)) => {
            tracing::error!(
                document_hash = %record.document_hash,
                error = %err,
                "Certificate commit failed, removing stored file"
            );
            if let Err(cleanup) = files.remove(&record.local_file_path) {
                tracing::error!(
                    path = %record.local_file_path,
                    error = %cleanup,
                    "Failed to remove file of uncommitted certificate"
                );
            }
            Err(ApiError::internal("Failed to save certificate"))
        }
        Err(err) => Err(err.into()),
    }
}

/// Register a document as a certificate of the signed-in institution.
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Certificates",
    request_body(content = RegisterCertificateForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Certificate registered", body = CertificateResponse),
        (status = 400, description = "Missing or empty file, or missing folder name"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Role may not register certificates"),
        (status = 409, description = "Document already registered"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn register_certificate(
    Institution(user): Institution,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CertificateResponse>, ApiError> {
    let form = read_register_form(&mut multipart, &state.files).await?;

    let upload = form
        .file
        .filter(|f| !f.staged.is_empty())
        .ok_or_else(|| ApiError::bad_request("Please select a file to upload"))?;

    let folder_name = form
        .folder_name
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("Folder name is required"))?;

    let local_file_path =
        state
            .files
            .relative_path(&user.email, &folder_name, &upload.file_name)?;

    let record = CertificateRecord {
        document_hash: upload.staged.document_hash(),
        original_file_name: upload.file_name,
        local_file_path,
        folder_name,
        issuer: user.email,
        upload_timestamp: Utc::now(),
    };

    let db = state.db.clone();
    let files = state.files.clone();
    let staged = upload.staged;
    let record = run_blocking(move || {
        commit_registration(&db, &files, staged, &record)?;
        Ok(record)
    })
    .await?;

    tracing::info!(
        document_hash = %record.document_hash,
        issuer = %record.issuer,
        folder = %record.folder_name,
        "Certificate registered"
    );

    Ok(Json(
        CertificateResponse::from(record).with_message("Certificate registered successfully"),
    ))
}

/// Compute the document hash of an uploaded file. Stores nothing.
#[utoipa::path(
    post,
    path = "/api/verify",
    tag = "Certificates",
    request_body(content = VerifyDocumentForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document hash", body = VerifyResponse),
        (status = 400, description = "Missing or empty file"),
        (status = 413, description = "Upload too large")
    )
)]
pub async fn verify_document(mut multipart: Multipart) -> Result<Json<VerifyResponse>, ApiError> {
    let hasher = hash_file_field(&mut multipart)
        .await?
        .filter(|h| h.bytes_hashed() > 0)
        .ok_or_else(|| ApiError::bad_request("Please select a file to verify"))?;

    Ok(Json(VerifyResponse {
        document_hash: hasher.finalize(),
    }))
}

/// Look up a registered certificate by document hash.
#[utoipa::path(
    get,
    path = "/api/certificates/{document_hash}",
    tag = "Certificates",
    params(
        ("document_hash" = String, Path, description = "Hex SHA-256 of the document")
    ),
    responses(
        (status = 200, description = "Certificate found", body = CertificateResponse),
        (status = 400, description = "Not a SHA-256 hex digest"),
        (status = 404, description = "No certificate with this hash")
    )
)]
pub async fn get_certificate(
    State(state): State<AppState>,
    Path(document_hash): Path<String>,
) -> Result<Json<CertificateResponse>, ApiError> {
    let document_hash = document_hash.trim().to_ascii_lowercase();
    if !is_document_hash(&document_hash) {
        return Err(ApiError::bad_request(
            "Document hash must be 64 hexadecimal characters",
        ));
    }

    let db = state.db.clone();
    let lookup = document_hash.clone();
    let record = run_blocking(move || Ok(db.find_by_hash(&lookup)?)).await?;

    record
        .map(|r| Json(CertificateResponse::from(r)))
        .ok_or_else(|| ApiError::not_found(format!("No certificate found for hash {document_hash}")))
}

/// All certificates registered by the signed-in institution.
#[utoipa::path(
    get,
    path = "/api/certificates",
    tag = "Certificates",
    responses(
        (status = 200, description = "Certificates of the caller", body = Vec<CertificateResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Role may not browse certificates")
    )
)]
pub async fn list_certificates(
    Institution(user): Institution,
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateResponse>>, ApiError> {
    let db = state.db.clone();
    let records = run_blocking(move || Ok(db.find_by_issuer(&user.email)?)).await?;

    Ok(Json(records.into_iter().map(CertificateResponse::from).collect()))
}
