// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{IdTokenVerifier, JwksManager, SessionStore, TokenExchangeClient};
use crate::config::AppConfig;
use crate::storage::{CertDatabase, FileStorage};

/// Google sign-in dependencies.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// ID token verifier (unconfigured in development)
    pub verifier: IdTokenVerifier,
    /// Authorization-code exchange, when client secret and redirect URI are set
    pub exchange: Option<TokenExchangeClient>,
}

impl AuthConfig {
    /// Build from runtime configuration.
    ///
    /// Without `GOOGLE_CLIENT_ID` the verifier stays unconfigured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, crate::auth::AuthError> {
        let google = &config.google;

        let verifier = match &google.client_id {
            Some(client_id) => {
                IdTokenVerifier::new(JwksManager::new(google.jwks_url.clone())?, client_id.clone())
            }
            None => IdTokenVerifier::unconfigured(),
        };

        let exchange = match google.code_exchange_credentials() {
            Some((id, secret, redirect)) => Some(TokenExchangeClient::new(
                google.token_url.clone(),
                id,
                secret,
                redirect,
            )?),
            None => None,
        };

        Ok(Self { verifier, exchange })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub files: Arc<FileStorage>,
    pub db: Arc<CertDatabase>,
    pub sessions: Arc<SessionStore>,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn new(config: AppConfig, files: FileStorage, db: CertDatabase) -> Self {
        let sessions = SessionStore::new(config.session_capacity, config.session_ttl);
        Self {
            config: Arc::new(config),
            files: Arc::new(files),
            db: Arc::new(db),
            sessions: Arc::new(sessions),
            auth_config: AuthConfig::default(),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }
}

/// State over a temporary directory, in development auth mode.
#[cfg(test)]
pub fn test_state() -> (AppState, tempfile::TempDir) {
    use crate::storage::StoragePaths;

    let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config = AppConfig {
        data_dir: temp.path().join("data"),
        upload_dir: temp.path().join("uploads"),
        ..AppConfig::default()
    };

    let files = FileStorage::open(StoragePaths::new(&config.upload_dir))
        .expect("Failed to open file storage");
    let db = CertDatabase::open(&config.database_path()).expect("Failed to open database");

    (AppState::new(config, files, db), temp)
}
