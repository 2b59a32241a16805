// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Google ID token verification.
//!
//! ## Verification Modes
//!
//! - **Production** (JWKS and `GOOGLE_CLIENT_ID` configured): signature
//!   against Google's JWKS, audience, issuer and expiry are all checked.
//! - **Development** (`dev` feature or tests, nothing configured): the token
//!   is decoded without a signature check; expiry and email are still checked.
//!
//! A release build without configuration rejects every token.

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Validation};

use super::claims::{GoogleClaims, VerifiedIdentity};
use super::error::AuthError;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Issuers Google uses for ID tokens.
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Verifies Google ID tokens and extracts the caller's identity.
#[derive(Clone, Default)]
pub struct IdTokenVerifier {
    jwks: Option<JwksManager>,
    client_id: Option<String>,
}

impl IdTokenVerifier {
    /// Production verifier.
    pub fn new(jwks: JwksManager, client_id: impl Into<String>) -> Self {
        Self {
            jwks: Some(jwks),
            client_id: Some(client_id.into()),
        }
    }

    /// Verifier without keys; only usable in development builds.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Whether signatures are checked.
    pub fn is_production(&self) -> bool {
        self.jwks.is_some() && self.client_id.is_some()
    }

    pub fn jwks(&self) -> Option<&JwksManager> {
        self.jwks.as_ref()
    }

    /// Verify an ID token and return the identity it proves.
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let claims = match (&self.jwks, &self.client_id) {
            (Some(jwks), Some(client_id)) => verify_production(token, jwks, client_id).await?,
            _ => verify_development(token)?,
        };

        VerifiedIdentity::from_claims(claims)
    }
}

async fn verify_production(
    token: &str,
    jwks: &JwksManager,
    client_id: &str,
) -> Result<GoogleClaims, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

    let (decoding_key, algorithm) = match &header.kid {
        Some(kid) => jwks.get_decoding_key(kid).await?,
        None => jwks.get_any_decoding_key().await?,
    };

    if header.alg != algorithm {
        return Err(AuthError::InvalidSignature);
    }

    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.set_issuer(&GOOGLE_ISSUERS);
    validation.set_audience(&[client_id]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    let token_data = decode::<GoogleClaims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        }
    })?;

    Ok(token_data.claims)
}

/// Decode without signature verification.
///
/// WARNING: development and tests only.
#[cfg(any(test, feature = "dev"))]
fn verify_development(token: &str) -> Result<GoogleClaims, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<GoogleClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    tracing::warn!(email = ?claims.email, "Accepted ID token without signature verification");
    Ok(claims)
}

#[cfg(not(any(test, feature = "dev")))]
fn verify_development(_token: &str) -> Result<GoogleClaims, AuthError> {
    Err(AuthError::NotConfigured("Google sign-in"))
}
