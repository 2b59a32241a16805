// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. JSON keys are camelCase.
//! All types derive `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Certificates**: registration results and lookups
//! - **Verification**: recomputed document hashes
//! - **Auth**: login requests and the current user
//! - **Folders**: file listings per folder

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{CertificateRecord, UserRecord};

// =============================================================================
// Certificate Models
// =============================================================================

/// A registered certificate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    /// Lowercase hex SHA-256 of the document.
    pub document_hash: String,
    /// File name as uploaded.
    pub original_file_name: String,
    /// Storage path relative to the upload root.
    pub local_file_path: String,
    pub folder_name: String,
    /// Email of the issuing institution.
    pub issuer: String,
    /// RFC 3339 UTC timestamp.
    pub upload_timestamp: String,
    /// Present on registration responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CertificateResponse {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<CertificateRecord> for CertificateResponse {
    fn from(record: CertificateRecord) -> Self {
        Self {
            document_hash: record.document_hash,
            original_file_name: record.original_file_name,
            local_file_path: record.local_file_path,
            folder_name: record.folder_name,
            issuer: record.issuer,
            upload_timestamp: record
                .upload_timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            message: None,
        }
    }
}

/// Multipart body of `POST /api/register` (documentation only).
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCertificateForm {
    /// The document to register.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Folder to file the document under.
    pub folder_name: String,
}

// =============================================================================
// Verification Models
// =============================================================================

/// Result of hashing an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub document_hash: String,
}

/// Multipart body of `POST /api/verify` (documentation only).
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
pub struct VerifyDocumentForm {
    /// The document to hash.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// =============================================================================
// Auth Models
// =============================================================================

/// Body of `POST /api/auth/login-exchange`. One of the two is required;
/// `idToken` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginExchangeRequest {
    /// Google ID token from the browser sign-in.
    #[serde(default)]
    pub id_token: Option<String>,
    /// One-time authorization code from the browser sign-in.
    #[serde(default)]
    pub code: Option<String>,
}

/// Body of `POST /api/auth/google-login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

/// The caller as seen by the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub name: String,
    pub email: Option<String>,
    /// `INSTITUTION`, `USER_REGULAR`, or `ANONYMOUS` for guests.
    pub role: String,
    pub authenticated: bool,
}

impl LoginResponse {
    /// Unauthenticated caller.
    pub fn guest() -> Self {
        Self {
            name: "Guest".to_string(),
            email: None,
            role: "ANONYMOUS".to_string(),
            authenticated: false,
        }
    }
}

impl From<&UserRecord> for LoginResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            name: user.name.clone(),
            email: Some(user.email.clone()),
            role: user.role.to_string(),
            authenticated: true,
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// Folder Models
// =============================================================================

/// Files stored in one folder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FolderContentResponse {
    pub folder_name: String,
    pub file_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use chrono::{TimeZone, Utc};

    #[test]
    fn certificate_response_uses_camel_case_and_rfc3339() {
        let record = CertificateRecord {
            document_hash: "ab".repeat(32),
            original_file_name: "report.pdf".to_string(),
            local_file_path: "registrar@acme.edu/2024/report.pdf".to_string(),
            folder_name: "2024".to_string(),
            issuer: "registrar@acme.edu".to_string(),
            upload_timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
        };

        let json = serde_json::to_value(
            CertificateResponse::from(record).with_message("Certificate registered"),
        )
        .unwrap();

        assert_eq!(json["documentHash"], "ab".repeat(32));
        assert_eq!(json["originalFileName"], "report.pdf");
        assert_eq!(json["localFilePath"], "registrar@acme.edu/2024/report.pdf");
        assert_eq!(json["folderName"], "2024");
        assert_eq!(json["uploadTimestamp"], "2024-06-01T08:30:00.000Z");
        assert_eq!(json["message"], "Certificate registered");
    }

    #[test]
    fn message_is_omitted_when_absent() {
        let response = CertificateResponse {
            document_hash: String::new(),
            original_file_name: String::new(),
            local_file_path: String::new(),
            folder_name: String::new(),
            issuer: String::new(),
            upload_timestamp: String::new(),
            message: None,
        };
        let json = serde_json::to_value(response).unwrap();
        assert!(json.get("message").is_none());
    }

    #[test]
    fn login_exchange_accepts_either_field() {
        let req: LoginExchangeRequest = serde_json::from_str(r#"{"idToken":"t"}"#).unwrap();
        assert_eq!(req.id_token.as_deref(), Some("t"));
        assert!(req.code.is_none());

        let req: LoginExchangeRequest = serde_json::from_str(r#"{"code":"c"}"#).unwrap();
        assert_eq!(req.code.as_deref(), Some("c"));

        let req: LoginExchangeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.id_token.is_none() && req.code.is_none());
    }

    #[test]
    fn login_response_for_user_and_guest() {
        let now = Utc::now();
        let user = UserRecord {
            email: "registrar@acme.edu".to_string(),
            name: "Registrar".to_string(),
            role: Role::Institution,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(LoginResponse::from(&user)).unwrap();
        assert_eq!(json["role"], "INSTITUTION");
        assert_eq!(json["authenticated"], true);

        let json = serde_json::to_value(LoginResponse::guest()).unwrap();
        assert_eq!(json["name"], "Guest");
        assert_eq!(json["email"], serde_json::Value::Null);
        assert_eq!(json["role"], "ANONYMOUS");
        assert_eq!(json["authenticated"], false);
    }
}
