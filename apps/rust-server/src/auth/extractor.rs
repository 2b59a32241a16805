// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for session-authenticated users.
//!
//! Use the `Session` extractor in handlers to require sign-in:
//!
//! ```rust,ignore
//! async fn my_handler(Session(user): Session) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use super::session::SESSION_COOKIE;
use super::{AuthError, AuthenticatedUser, Capability};
use crate::state::AppState;

/// Extractor for signed-in users.
///
/// Resolves the `CERTS_SESSION` cookie against the session store. Rejects
/// with 401 when the cookie is missing or the session is unknown/expired.
///
/// # Example
///
/// ```rust,ignore
/// async fn list_folders(
///     Session(user): Session,
///     State(state): State<AppState>,
/// ) -> Result<Json<Vec<String>>, ApiError> {
///     // user.email is the issuer identity
/// }
/// ```
pub struct Session(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Session {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let user = state
            .sessions
            .get(&session_id)
            .ok_or(AuthError::SessionExpired)?;

        Ok(Session(user))
    }
}

/// Extractor that requires an institution account.
///
/// Registration and folder browsing are gated on the capabilities only
/// `Role::Institution` holds; other roles get 403.
pub struct Institution(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Institution {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Session(user) = Session::from_request_parts(parts, state).await?;

        user.require(Capability::RegisterCertificates)?;
        user.require(Capability::BrowseFolders)?;

        Ok(Institution(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` if no valid session is present, instead of rejecting.
pub struct OptionalSession(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Session::from_request_parts(parts, state).await {
            Ok(Session(user)) => Ok(OptionalSession(Some(user))),
            Err(_) => Ok(OptionalSession(None)),
        }
    }
}
