// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded metadata database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `certificates`: document_hash → serialized CertificateRecord
//! - `issuer_folder_index`: composite key (issuer\0folder\0timestamp\0hash) → document_hash
//! - `users`: email → serialized UserRecord
//!
//! redb runs one write transaction at a time, so the duplicate check and the
//! insert in [`CertDatabase::save_with`] cannot interleave with another
//! registration of the same hash.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::files::StorageError;
use super::records::{CertificateRecord, UserRecord};
use crate::auth::Role;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: document_hash → serialized CertificateRecord (JSON bytes).
const CERTIFICATES: TableDefinition<&str, &[u8]> = TableDefinition::new("certificates");

/// Index: composite key → document_hash.
/// Key format: `issuer \0 folder \0 timestamp_be \0 hash`, ascending upload order.
const ISSUER_FOLDER_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("issuer_folder_index");

/// Users: email → serialized UserRecord (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Key separator. Identities and folder names never contain NUL.
const SEP: u8 = 0x00;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Certificate with hash {0} is already registered")]
    DuplicateHash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the issuer_folder_index table.
fn make_index_key(issuer: &str, folder: &str, timestamp_micros: i64, hash: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(issuer.len() + folder.len() + hash.len() + 11);
    key.extend_from_slice(issuer.as_bytes());
    key.push(SEP);
    key.extend_from_slice(folder.as_bytes());
    key.push(SEP);
    // Pre-epoch timestamps clamp to zero; ordering only matters among real uploads
    key.extend_from_slice(&(timestamp_micros.max(0) as u64).to_be_bytes());
    key.push(SEP);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Range covering every key that starts with `parts` joined by separators.
///
/// Keys under the prefix continue with `SEP`, so `prefix + 0x01` bounds them.
fn prefix_range(parts: &[&str]) -> (Vec<u8>, Vec<u8>) {
    let mut start = Vec::new();
    for part in parts {
        start.extend_from_slice(part.as_bytes());
        start.push(SEP);
    }
    let mut end = start.clone();
    if let Some(last) = end.last_mut() {
        *last = SEP + 1;
    }
    (start, end)
}

// =============================================================================
// CertDatabase
// =============================================================================

/// Embedded ACID store for certificate metadata and users.
pub struct CertDatabase {
    db: Database,
}

impl CertDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> MetadataResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CERTIFICATES)?;
            let _ = write_txn.open_table(ISSUER_FOLDER_INDEX)?;
            let _ = write_txn.open_table(USERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Verify the database can serve reads.
    pub fn health_check(&self) -> MetadataResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(CERTIFICATES)?;
        Ok(())
    }

    // =========================================================================
    // Certificates
    // =========================================================================

    /// Persist a new certificate record.
    ///
    /// Fails with [`MetadataError::DuplicateHash`] if the hash is already stored.
    pub fn save(&self, record: &CertificateRecord) -> MetadataResult<()> {
        self.save_with(record, || Ok(()))
    }

    /// Persist a new certificate record, running `side_effect` after the
    /// insert and before the commit.
    ///
    /// If the hash already exists the side effect never runs. If the side
    /// effect fails the transaction is aborted and nothing is persisted.
    /// A [`MetadataError::RedbCommit`] means the side effect already ran.
    pub fn save_with<F>(&self, record: &CertificateRecord, side_effect: F) -> MetadataResult<()>
    where
        F: FnOnce() -> Result<(), StorageError>,
    {
        let json = serde_json::to_vec(record)?;
        let hash = record.document_hash.as_str();
        let key = make_index_key(
            &record.issuer,
            &record.folder_name,
            record.upload_timestamp.timestamp_micros(),
            hash,
        );

        let write_txn = self.db.begin_write()?;
        let duplicate = {
            let mut certs = write_txn.open_table(CERTIFICATES)?;
            let exists = certs.get(hash)?.is_some();
            if !exists {
                certs.insert(hash, json.as_slice())?;
                let mut index = write_txn.open_table(ISSUER_FOLDER_INDEX)?;
                index.insert(key.as_slice(), hash)?;
            }
            exists
        };

        if duplicate {
            write_txn.abort()?;
            return Err(MetadataError::DuplicateHash(hash.to_string()));
        }

        if let Err(e) = side_effect() {
            if let Err(abort_err) = write_txn.abort() {
                tracing::warn!(error = %abort_err, "Failed to abort certificate transaction");
            }
            return Err(e.into());
        }

        write_txn.commit()?;
        Ok(())
    }

    /// Look up a certificate by document hash.
    pub fn find_by_hash(&self, hash: &str) -> MetadataResult<Option<CertificateRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CERTIFICATES)?;
        match table.get(hash)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All certificates of an issuer, grouped by folder then upload order.
    pub fn find_by_issuer(&self, issuer: &str) -> MetadataResult<Vec<CertificateRecord>> {
        let (start, end) = prefix_range(&[issuer]);
        self.scan_index(&start, &end)
    }

    /// Certificates of an issuer in one folder, in upload order.
    pub fn find_by_issuer_and_folder(
        &self,
        issuer: &str,
        folder: &str,
    ) -> MetadataResult<Vec<CertificateRecord>> {
        let (start, end) = prefix_range(&[issuer, folder]);
        self.scan_index(&start, &end)
    }

    fn scan_index(&self, start: &[u8], end: &[u8]) -> MetadataResult<Vec<CertificateRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ISSUER_FOLDER_INDEX)?;
        let certs = read_txn.open_table(CERTIFICATES)?;

        let mut records = Vec::new();
        for entry in index.range(start..end)? {
            let (_, hash) = entry?;
            if let Some(value) = certs.get(hash.value())? {
                records.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(records)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Look up a user by email.
    pub fn find_user(&self, email: &str) -> MetadataResult<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(email)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Record a successful login.
    ///
    /// First sight creates the user with the `Institution` role; later
    /// logins only refresh the display name.
    pub fn upsert_login(&self, email: &str, name: &str) -> MetadataResult<UserRecord> {
        let now = Utc::now();

        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let existing: Option<UserRecord> = match users.get(email)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            let user = match existing {
                Some(mut user) => {
                    user.name = name.to_string();
                    user.updated_at = now;
                    user
                }
                None => {
                    tracing::info!(email = %email, "Registering new user");
                    UserRecord {
                        email: email.to_string(),
                        name: name.to_string(),
                        role: Role::Institution,
                        created_at: now,
                        updated_at: now,
                    }
                }
            };

            let json = serde_json::to_vec(&user)?;
            users.insert(email, json.as_slice())?;
            user
        };
        write_txn.commit()?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, CertDatabase) {
        let temp = TempDir::new().unwrap();
        let db = CertDatabase::open(&temp.path().join("certs.redb")).unwrap();
        (temp, db)
    }

    fn record(hash_seed: &str, issuer: &str, folder: &str, offset_secs: i64) -> CertificateRecord {
        CertificateRecord {
            document_hash: crate::hashing::hash_bytes(hash_seed.as_bytes()),
            original_file_name: format!("{hash_seed}.pdf"),
            local_file_path: format!("{issuer}/{folder}/{hash_seed}.pdf"),
            folder_name: folder.to_string(),
            issuer: issuer.to_string(),
            upload_timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn save_and_find_by_hash() {
        let (_temp, db) = test_db();
        let rec = record("report", "acme", "2024", 0);

        db.save(&rec).unwrap();

        assert_eq!(db.find_by_hash(&rec.document_hash).unwrap(), Some(rec));
        assert_eq!(db.find_by_hash(&"0".repeat(64)).unwrap(), None);
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let (_temp, db) = test_db();
        let first = record("report", "acme", "2024", 0);
        let mut second = record("report", "acme", "2024", 5);
        second.original_file_name = "copy.pdf".to_string();

        db.save(&first).unwrap();
        let result = db.save(&second);

        assert!(matches!(result, Err(MetadataError::DuplicateHash(h)) if h == first.document_hash));
        assert_eq!(db.find_by_hash(&first.document_hash).unwrap(), Some(first));
        assert_eq!(db.find_by_issuer("acme").unwrap().len(), 1);
    }

    #[test]
    fn duplicate_skips_side_effect() {
        let (_temp, db) = test_db();
        let rec = record("report", "acme", "2024", 0);
        db.save(&rec).unwrap();

        let mut ran = false;
        let result = db.save_with(&rec, || {
            ran = true;
            Ok(())
        });

        assert!(matches!(result, Err(MetadataError::DuplicateHash(_))));
        assert!(!ran);
    }

    #[test]
    fn failed_side_effect_rolls_back_insert() {
        let (_temp, db) = test_db();
        let rec = record("report", "acme", "2024", 0);

        let result = db.save_with(&rec, || Err(StorageError::EmptyFile("report.pdf".into())));

        assert!(matches!(result, Err(MetadataError::Storage(_))));
        assert_eq!(db.find_by_hash(&rec.document_hash).unwrap(), None);
        assert!(db.find_by_issuer_and_folder("acme", "2024").unwrap().is_empty());

        // The hash is free again after the rollback
        db.save(&rec).unwrap();
    }

    #[test]
    fn folder_listing_filters_and_keeps_upload_order() {
        let (_temp, db) = test_db();
        let later = record("b", "acme", "2024", 60);
        let earlier = record("a", "acme", "2024", 0);
        let other_folder = record("c", "acme", "2023", 30);
        let other_issuer = record("d", "globex", "2024", 10);
        // Folder name that extends "2024" must not leak into its range
        let longer_folder = record("e", "acme", "2024-old", 20);

        for rec in [&later, &earlier, &other_folder, &other_issuer, &longer_folder] {
            db.save(rec).unwrap();
        }

        let listed = db.find_by_issuer_and_folder("acme", "2024").unwrap();
        assert_eq!(listed, vec![earlier.clone(), later.clone()]);

        let all = db.find_by_issuer("acme").unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|r| r.issuer == "acme"));

        assert!(db.find_by_issuer("acme@").unwrap().is_empty());
        assert!(db.find_by_issuer_and_folder("nobody", "2024").unwrap().is_empty());
    }

    #[test]
    fn concurrent_duplicates_commit_once() {
        let (_temp, db) = test_db();
        let db = Arc::new(db);
        let rec = record("race", "acme", "2024", 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                let rec = rec.clone();
                std::thread::spawn(move || db.save(&rec))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let committed = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(MetadataError::DuplicateHash(_))))
            .count();

        assert_eq!(committed, 1);
        assert_eq!(conflicts, 7);
    }

    #[test]
    fn upsert_login_creates_institution_then_refreshes_name() {
        let (_temp, db) = test_db();

        let created = db.upsert_login("registrar@acme.edu", "Registrar").unwrap();
        assert_eq!(created.role, Role::Institution);
        assert_eq!(created.name, "Registrar");

        let refreshed = db
            .upsert_login("registrar@acme.edu", "Office of the Registrar")
            .unwrap();
        assert_eq!(refreshed.name, "Office of the Registrar");
        assert_eq!(refreshed.created_at, created.created_at);
        assert_eq!(refreshed.role, Role::Institution);

        assert_eq!(
            db.find_user("registrar@acme.edu").unwrap(),
            Some(refreshed)
        );
        assert_eq!(db.find_user("unknown@acme.edu").unwrap(), None);
    }

    #[test]
    fn reopen_preserves_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("certs.redb");
        let rec = record("persisted", "acme", "2024", 0);

        {
            let db = CertDatabase::open(&path).unwrap();
            db.save(&rec).unwrap();
        }

        let db = CertDatabase::open(&path).unwrap();
        db.health_check().unwrap();
        assert_eq!(db.find_by_hash(&rec.document_hash).unwrap(), Some(rec));
    }
}
