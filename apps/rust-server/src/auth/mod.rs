// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Google sign-in with server-side sessions.
//!
//! ## Auth Flow
//!
//! 1. Frontend signs the user in with Google and obtains either an ID token
//!    or a one-time authorization code
//! 2. Frontend posts it to `/api/auth/login-exchange`
//! 3. Server:
//!    - Exchanges the code for an ID token (code flow only)
//!    - Verifies the ID token against Google's JWKS, audience and issuer
//!    - Creates or refreshes the user record (first login → `INSTITUTION`)
//!    - Opens a session and sets the `CERTS_SESSION` cookie
//! 4. Later requests are authenticated by that cookie alone
//!
//! ## Security
//!
//! - The issuer of a certificate is always the session's verified email
//! - Session ids are 256-bit random values from `ring::rand::SystemRandom`
//! - JWKS is cached with TTL; clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod exchange;
pub mod extractor;
pub mod jwks;
pub mod roles;
pub mod session;
pub mod verifier;

pub use claims::{AuthenticatedUser, VerifiedIdentity};
pub use error::AuthError;
pub use exchange::{ExchangeError, TokenExchangeClient};
pub use extractor::{Institution, OptionalSession, Session};
pub use jwks::JwksManager;
pub use roles::{Capability, Role};
pub use session::{SessionStore, SESSION_COOKIE};
pub use verifier::IdTokenVerifier;
