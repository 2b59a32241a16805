// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SHA-256 content hashing for uploaded documents.
//!
//! The lowercase hex digest of a document's bytes is its content-addressed
//! key: registration stores it, verification recomputes it.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read buffer size used when hashing streams.
const HASH_BUFFER_SIZE: usize = 8192;

/// Length of a hex-encoded SHA-256 digest.
pub const DOCUMENT_HASH_LEN: usize = 64;

/// Incremental SHA-256 hasher for data that arrives in chunks
/// (multipart upload fields, staged files).
#[derive(Clone, Default)]
pub struct StreamingHasher {
    inner: Sha256,
    bytes_hashed: u64,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of input.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.bytes_hashed += chunk.len() as u64;
    }

    /// Total number of bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }

    /// Consume the hasher and render the digest as lowercase hex.
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Hash a byte stream with a bounded buffer.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = StreamingHasher::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hasher.finalize())
}

/// Hash an in-memory byte slice.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash the contents of a file on disk.
pub fn hash_file(path: impl AsRef<Path>) -> io::Result<String> {
    hash_reader(File::open(path)?)
}

/// Whether `value` has the shape of a document hash (64 lowercase hex chars).
pub fn is_document_hash(value: &str) -> bool {
    value.len() == DOCUMENT_HASH_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
