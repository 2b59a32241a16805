// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Certificate Registry - Document Authenticity Service
//!
//! Institutions sign in with Google and register documents. Each document is
//! identified by the SHA-256 hash of its bytes; anyone can later hash a copy
//! and look the hash up to check it was registered.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Google sign-in, sessions and roles
//! - `hashing` - Streaming SHA-256 document hashes
//! - `storage` - Uploaded files on disk and certificate metadata (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod hashing;
pub mod models;
pub mod state;
pub mod storage;
