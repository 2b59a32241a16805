// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Two stores back the service:
//!
//! - **File storage**: uploaded documents on the local filesystem, one
//!   directory per issuer and folder.
//! - **Metadata store**: certificate records and users in an embedded redb
//!   database, keyed by document hash and email.
//!
//! ## Storage Layout
//!
//! ```text
//! {UPLOAD_DIR}/
//!   .staging/{uuid}.part       # in-flight uploads
//!   {issuer}/{folder}/{name}   # registered documents
//!
//! {DATA_DIR}/
//!   certs.redb                 # certificates, issuer/folder index, users
//! ```

pub mod database;
pub mod files;
pub mod paths;
pub mod records;

pub use database::{CertDatabase, MetadataError, MetadataResult};
pub use files::{FileStorage, StagedFile, StorageError, StorageResult};
pub use paths::{sanitize_file_name, validate_component, StoragePaths};
pub use records::{CertificateRecord, UserRecord};
