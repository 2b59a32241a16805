// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

/// Metadata of a registered document. Immutable once saved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Lowercase hex SHA-256 of the document bytes (unique)
    pub document_hash: String,
    /// File name as uploaded
    pub original_file_name: String,
    /// Root-relative storage path (`identity/folder/name`)
    pub local_file_path: String,
    /// Folder chosen by the issuer
    pub folder_name: String,
    /// Issuer identity (verified email)
    pub issuer: String,
    /// When the document was registered
    pub upload_timestamp: DateTime<Utc>,
}

/// A user known to the service. Created on first login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserRecord {
    /// Verified email (unique)
    pub email: String,
    /// Display name, refreshed on every login
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
