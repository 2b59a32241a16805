// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use super::run_blocking;
use crate::{
    auth::Institution,
    error::ApiError,
    models::{CertificateResponse, FolderContentResponse},
    state::AppState,
};

/// Folder names of the signed-in institution, sorted.
#[utoipa::path(
    get,
    path = "/api/folders",
    tag = "Folders",
    responses(
        (status = 200, description = "Folder names", body = Vec<String>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Role may not browse folders")
    )
)]
pub async fn list_folders(
    Institution(user): Institution,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let files = state.files.clone();
    let folders = run_blocking(move || Ok(files.list_folders(&user.email)?)).await?;
    Ok(Json(folders))
}

/// Certificate records in one folder, in upload order.
#[utoipa::path(
    get,
    path = "/api/folders/{folder_name}/certificates",
    tag = "Folders",
    params(
        ("folder_name" = String, Path, description = "Folder of the caller")
    ),
    responses(
        (status = 200, description = "Certificates in the folder", body = Vec<CertificateResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Role may not browse folders")
    )
)]
pub async fn list_folder_certificates(
    Institution(user): Institution,
    State(state): State<AppState>,
    Path(folder_name): Path<String>,
) -> Result<Json<Vec<CertificateResponse>>, ApiError> {
    let db = state.db.clone();
    let records = run_blocking(move || {
        Ok(db.find_by_issuer_and_folder(&user.email, &folder_name)?)
    })
    .await?;

    Ok(Json(records.into_iter().map(CertificateResponse::from).collect()))
}

/// Stored file names in one folder, sorted.
#[utoipa::path(
    get,
    path = "/api/folders/{folder_name}/files",
    tag = "Folders",
    params(
        ("folder_name" = String, Path, description = "Folder of the caller")
    ),
    responses(
        (status = 200, description = "Files in the folder", body = FolderContentResponse),
        (status = 400, description = "Invalid folder name"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Role may not browse folders")
    )
)]
pub async fn list_folder_files(
    Institution(user): Institution,
    State(state): State<AppState>,
    Path(folder_name): Path<String>,
) -> Result<Json<FolderContentResponse>, ApiError> {
    let files = state.files.clone();
    let folder = folder_name.clone();
    let file_names = run_blocking(move || Ok(files.list_files(&user.email, &folder)?)).await?;

    Ok(Json(FolderContentResponse {
        folder_name,
        file_names,
    }))
}
