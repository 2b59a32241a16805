// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::exchange::ExchangeError;
use super::roles::Capability;

/// Authentication error type.
///
/// Covers session lookup, Google ID token verification, the
/// authorization-code exchange and capability checks.
#[derive(Debug)]
pub enum AuthError {
    /// Login request carried neither an ID token nor a code
    MissingCredentials,
    /// No session cookie on the request
    MissingSession,
    /// Session cookie names an unknown or expired session
    SessionExpired,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Token issuer is not Google
    InvalidIssuer,
    /// Token audience is not this client
    InvalidAudience,
    /// Token is not yet valid
    TokenNotYetValid,
    /// Token carries no email claim
    MissingEmail,
    /// Google reports the email as unverified
    UnverifiedEmail,
    /// JWKS fetch failed
    JwksFetchError(String),
    /// No matching key in JWKS
    NoMatchingKey,
    /// Token endpoint refused the authorization code
    ExchangeRejected(String),
    /// Token endpoint unreachable or answered unusably
    ExchangeFailed(String),
    /// A login path is not configured on this server
    NotConfigured(&'static str),
    /// Internal error
    InternalError(String),
    /// Role lacks the capability
    InsufficientPermissions(Capability),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MissingSession => "missing_session",
            AuthError::SessionExpired => "session_expired",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::MissingEmail => "missing_email",
            AuthError::UnverifiedEmail => "unverified_email",
            AuthError::JwksFetchError(_) => "jwks_fetch_error",
            AuthError::NoMatchingKey => "no_matching_key",
            AuthError::ExchangeRejected(_) => "exchange_rejected",
            AuthError::ExchangeFailed(_) => "exchange_failed",
            AuthError::NotConfigured(_) => "not_configured",
            AuthError::InternalError(_) => "internal_error",
            AuthError::InsufficientPermissions(_) => "insufficient_permissions",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials => StatusCode::BAD_REQUEST,
            AuthError::MissingSession
            | AuthError::SessionExpired
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::TokenNotYetValid
            | AuthError::MissingEmail
            | AuthError::UnverifiedEmail
            | AuthError::NoMatchingKey
            | AuthError::ExchangeRejected(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            AuthError::JwksFetchError(_) | AuthError::ExchangeFailed(_) => StatusCode::BAD_GATEWAY,
            AuthError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => {
                write!(f, "Either idToken or code is required")
            }
            AuthError::MissingSession => write!(f, "Authentication required"),
            AuthError::SessionExpired => write!(f, "Session has expired, sign in again"),
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InvalidIssuer => write!(f, "Token issuer is invalid"),
            AuthError::InvalidAudience => write!(f, "Token audience is invalid"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::MissingEmail => write!(f, "Token does not carry an email address"),
            AuthError::UnverifiedEmail => write!(f, "Email address is not verified"),
            AuthError::JwksFetchError(msg) => write!(f, "Failed to fetch JWKS: {msg}"),
            AuthError::NoMatchingKey => write!(f, "No matching key found in JWKS"),
            AuthError::ExchangeRejected(msg) => {
                write!(f, "Authorization code was rejected: {msg}")
            }
            AuthError::ExchangeFailed(msg) => write!(f, "Token exchange failed: {msg}"),
            AuthError::NotConfigured(what) => write!(f, "{what} is not configured"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
            AuthError::InsufficientPermissions(capability) => {
                write!(f, "Your role may not {capability}")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl From<ExchangeError> for AuthError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Rejected { .. } => AuthError::ExchangeRejected(err.to_string()),
            _ => AuthError::ExchangeFailed(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
