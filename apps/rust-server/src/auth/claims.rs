// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Google ID token claims and the authenticated user representation.

use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::roles::{Capability, Role};

/// Claims of a Google ID token.
///
/// See: https://developers.google.com/identity/openid-connect/openid-connect#an-id-tokens-payload
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    /// Stable Google account identifier
    pub sub: String,

    /// Account email (present when the `email` scope was granted)
    #[serde(default)]
    pub email: Option<String>,

    /// Whether Google has verified the email
    #[serde(default)]
    pub email_verified: Option<bool>,

    /// Full display name
    #[serde(default)]
    pub name: Option<String>,

    /// Issuer (checked by the verifier)
    #[serde(default)]
    pub iss: String,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,
}

/// Identity proven by a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub name: String,
}

impl VerifiedIdentity {
    /// Extract the identity, requiring a verified email.
    ///
    /// The display name falls back to the email when the token has none.
    pub fn from_claims(claims: GoogleClaims) -> Result<Self, AuthError> {
        let email = claims
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::MissingEmail)?;

        if claims.email_verified == Some(false) {
            return Err(AuthError::UnverifiedEmail);
        }

        let name = claims
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.clone());

        Ok(Self {
            subject: claims.sub,
            email,
            name,
        })
    }
}

/// Authenticated user resolved from a session.
///
/// This is the identity handlers act on. `email` is the issuer identity
/// for every certificate the user registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Verified email
    pub email: String,

    /// Display name
    pub name: String,

    /// Role at login time
    pub role: Role,

    /// Session the request was made with (never serialized)
    #[serde(skip)]
    pub session_id: String,
}

impl AuthenticatedUser {
    /// Check if the user's role grants the capability.
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    /// Fail with 403 unless the user's role grants the capability.
    pub fn require(&self, capability: Capability) -> Result<(), AuthError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions(capability))
        }
    }
}
