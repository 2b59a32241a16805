// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth authorization-code exchange against Google's token endpoint.
//!
//! The browser obtains a one-time `code`; the server trades it (with the
//! client secret) for tokens and keeps only the `id_token`, which then goes
//! through the normal [`IdTokenVerifier`](super::verifier::IdTokenVerifier).

use std::{collections::HashMap, time::Duration};

use reqwest::Client;
use serde::Deserialize;

/// Google's OAuth 2.0 token endpoint.
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Timeout for one exchange request.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("token request failed: {0}")]
    Transport(String),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token endpoint returned {status}")]
    Upstream { status: u16 },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("token response did not include id_token")]
    MissingIdToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Client for the authorization-code grant.
#[derive(Clone)]
pub struct TokenExchangeClient {
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

impl std::fmt::Debug for TokenExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchangeClient")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

impl TokenExchangeClient {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            http,
        })
    }

    /// Trade an authorization code for a Google ID token.
    ///
    /// A 4xx answer means the code was refused ([`ExchangeError::Rejected`]);
    /// every other failure is an upstream problem.
    pub async fn exchange_code(&self, code: &str) -> Result<String, ExchangeError> {
        let mut form = HashMap::new();
        form.insert("grant_type", "authorization_code");
        form.insert("code", code);
        form.insert("client_id", self.client_id.as_str());
        form.insert("client_secret", self.client_secret.as_str());
        form.insert("redirect_uri", self.redirect_uri.as_str());

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            return Err(ExchangeError::Upstream {
                status: status.as_u16(),
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;

        match token_response.id_token {
            Some(id_token) if !id_token.trim().is_empty() => Ok(id_token),
            _ => Err(ExchangeError::MissingIdToken),
        }
    }
}
