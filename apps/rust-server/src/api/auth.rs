// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in, sign-out and current-user endpoints.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::run_blocking;
use crate::{
    auth::{AuthError, AuthenticatedUser, OptionalSession, SESSION_COOKIE},
    error::ApiError,
    models::{GoogleLoginRequest, LoginExchangeRequest, LoginResponse, MessageResponse},
    state::AppState,
};

/// Login failures keep the `{error, error_code}` body of [`AuthError`].
pub enum LoginError {
    Auth(AuthError),
    Api(ApiError),
}

impl From<AuthError> for LoginError {
    fn from(err: AuthError) -> Self {
        LoginError::Auth(err)
    }
}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        LoginError::Api(err)
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            LoginError::Auth(err) => err.into_response(),
            LoginError::Api(err) => err.into_response(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn session_cookie(session_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .build()
}

/// Verify the ID token, record the user and open a session.
async fn complete_login(
    state: &AppState,
    previous: Option<AuthenticatedUser>,
    jar: CookieJar,
    id_token: &str,
) -> Result<(CookieJar, Json<LoginResponse>), LoginError> {
    let identity = state.auth_config.verifier.verify(id_token).await?;

    let db = state.db.clone();
    let (email, name) = (identity.email.clone(), identity.name.clone());
    let user = run_blocking(move || Ok(db.upsert_login(&email, &name)?)).await?;

    if let Some(previous) = previous {
        state.sessions.remove(&previous.session_id);
    }
    let session_id = state.sessions.create(&user.email, &user.name, user.role)?;

    tracing::info!(email = %user.email, role = %user.role, "User signed in");

    let jar = jar.add(session_cookie(session_id, state.config.tls_enabled()));
    Ok((jar, Json(LoginResponse::from(&user))))
}

/// Sign in with a Google ID token or authorization code.
///
/// The code is exchanged server-side for an ID token. Either way the token
/// is verified before a session is opened.
#[utoipa::path(
    post,
    path = "/api/auth/login-exchange",
    tag = "Auth",
    request_body = LoginExchangeRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = LoginResponse),
        (status = 400, description = "Neither idToken nor code given"),
        (status = 401, description = "Token or code rejected"),
        (status = 502, description = "Google unreachable"),
        (status = 503, description = "Sign-in method not configured")
    )
)]
pub async fn login_exchange(
    State(state): State<AppState>,
    OptionalSession(previous): OptionalSession,
    jar: CookieJar,
    Json(request): Json<LoginExchangeRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), LoginError> {
    let id_token = match (non_empty(request.id_token), non_empty(request.code)) {
        (Some(id_token), _) => id_token,
        (None, Some(code)) => {
            let exchange = state
                .auth_config
                .exchange
                .as_ref()
                .ok_or(AuthError::NotConfigured("Authorization code sign-in"))?;
            exchange.exchange_code(&code).await.map_err(AuthError::from)?
        }
        (None, None) => return Err(AuthError::MissingCredentials.into()),
    };

    complete_login(&state, previous, jar, &id_token).await
}

/// Sign in with a Google ID token.
#[utoipa::path(
    post,
    path = "/api/auth/google-login",
    tag = "Auth",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = LoginResponse),
        (status = 400, description = "Empty idToken"),
        (status = 401, description = "Token rejected")
    )
)]
pub async fn google_login(
    State(state): State<AppState>,
    OptionalSession(previous): OptionalSession,
    jar: CookieJar,
    Json(request): Json<GoogleLoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), LoginError> {
    let id_token = non_empty(Some(request.id_token)).ok_or(AuthError::MissingCredentials)?;
    complete_login(&state, previous, jar, &id_token).await
}

/// End the current session. Succeeds without one.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Signed out; session cookie cleared", body = MessageResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    OptionalSession(user): OptionalSession,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(user) = user {
        state.sessions.remove(&user.session_id);
        tracing::info!(email = %user.email, "User signed out");
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// The caller: the stored user when signed in, a guest otherwise.
#[utoipa::path(
    get,
    path = "/api/auth/user",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user or guest", body = LoginResponse)
    )
)]
pub async fn current_user(
    State(state): State<AppState>,
    OptionalSession(user): OptionalSession,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(user) = user else {
        return Ok(Json(LoginResponse::guest()));
    };

    let db = state.db.clone();
    let email = user.email.clone();
    let stored = run_blocking(move || Ok(db.find_user(&email)?)).await?;

    Ok(Json(match stored {
        Some(record) => LoginResponse::from(&record),
        None => LoginResponse {
            name: user.name,
            email: Some(user.email),
            role: user.role.to_string(),
            authenticated: true,
        },
    }))
}
