// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory of the metadata database (`certs.redb`) | `./data` |
//! | `UPLOAD_DIR` | Root of the certificate file tree | `./uploads` |
//! | `GOOGLE_CLIENT_ID` | Expected ID token audience | Required for production |
//! | `GOOGLE_CLIENT_SECRET` | Client secret for the code exchange | Optional |
//! | `GOOGLE_REDIRECT_URI` | Redirect URI for the code exchange | Optional |
//! | `GOOGLE_JWKS_URL` | Google signing keys | `https://www.googleapis.com/oauth2/v3/certs` |
//! | `GOOGLE_TOKEN_URL` | Google token endpoint | `https://oauth2.googleapis.com/token` |
//! | `SESSION_TTL_SECS` | Idle lifetime of a session | `3600` |
//! | `SESSION_CAPACITY` | Maximum live sessions | `10000` |
//! | `MAX_UPLOAD_BYTES` | Request body limit for uploads | `20971520` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated origins allowed with credentials | local dev servers |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key; HTTPS when both set | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Malformed numbers fall back to their default. Malformed URLs fail startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::exchange::DEFAULT_GOOGLE_TOKEN_URL;
use crate::auth::jwks::DEFAULT_GOOGLE_JWKS_URL;
use crate::storage::paths::UPLOAD_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";
pub const GOOGLE_CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";
pub const GOOGLE_CLIENT_SECRET_ENV: &str = "GOOGLE_CLIENT_SECRET";
pub const GOOGLE_REDIRECT_URI_ENV: &str = "GOOGLE_REDIRECT_URI";
pub const GOOGLE_JWKS_URL_ENV: &str = "GOOGLE_JWKS_URL";
pub const GOOGLE_TOKEN_URL_ENV: &str = "GOOGLE_TOKEN_URL";
pub const SESSION_TTL_SECS_ENV: &str = "SESSION_TTL_SECS";
pub const SESSION_CAPACITY_ENV: &str = "SESSION_CAPACITY";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DATABASE_FILE: &str = "certs.redb";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{var} must be an http(s) URL, got '{value}'")]
    UnsupportedScheme { var: &'static str, value: String },

    #[error("{var} is not a valid address: '{value}'")]
    InvalidAddress { var: &'static str, value: String },
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// Read `LOG_FORMAT` on its own, so logging can start before the rest
    /// of the configuration is parsed.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    /// `json` (any case) selects JSON; anything else is pretty.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Google OAuth client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub jwks_url: String,
    pub token_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            jwks_url: DEFAULT_GOOGLE_JWKS_URL.to_string(),
            token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

impl GoogleConfig {
    /// Client id, secret and redirect URI, when all three are set.
    /// The code flow is disabled otherwise.
    pub fn code_exchange_credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.client_id, &self.client_secret, &self.redirect_uri) {
            (Some(id), Some(secret), Some(redirect)) => {
                Some((id.as_str(), secret.as_str(), redirect.as_str()))
            }
            _ => None,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub google: GoogleConfig,
    pub session_ttl: Duration,
    pub session_capacity: usize,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub tls: Option<TlsPaths>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            upload_dir: PathBuf::from(UPLOAD_ROOT),
            google: GoogleConfig::default(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            session_capacity: DEFAULT_SESSION_CAPACITY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            tls: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and blank are the same thing
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let host = var(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidAddress {
            var: HOST_ENV,
            value: host.clone(),
        })?;
        let port = parse_or(var(PORT_ENV), DEFAULT_PORT, PORT_ENV);

        let google = GoogleConfig {
            client_id: var(GOOGLE_CLIENT_ID_ENV),
            client_secret: var(GOOGLE_CLIENT_SECRET_ENV),
            redirect_uri: var(GOOGLE_REDIRECT_URI_ENV),
            jwks_url: checked_url(
                GOOGLE_JWKS_URL_ENV,
                var(GOOGLE_JWKS_URL_ENV).unwrap_or_else(|| DEFAULT_GOOGLE_JWKS_URL.to_string()),
            )?,
            token_url: checked_url(
                GOOGLE_TOKEN_URL_ENV,
                var(GOOGLE_TOKEN_URL_ENV).unwrap_or_else(|| DEFAULT_GOOGLE_TOKEN_URL.to_string()),
            )?,
        };

        let cors_origins = match var(CORS_ALLOWED_ORIGINS_ENV) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(|o| checked_url(CORS_ALLOWED_ORIGINS_ENV, o.to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.cors_origins,
        };

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "Only one of {TLS_CERT_PATH_ENV}/{TLS_KEY_PATH_ENV} is set, serving plain HTTP"
                );
                None
            }
        };

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            data_dir: var(DATA_DIR_ENV).map(PathBuf::from).unwrap_or(defaults.data_dir),
            upload_dir: var(UPLOAD_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            google,
            session_ttl: Duration::from_secs(parse_or(
                var(SESSION_TTL_SECS_ENV),
                DEFAULT_SESSION_TTL_SECS,
                SESSION_TTL_SECS_ENV,
            )),
            session_capacity: parse_or(
                var(SESSION_CAPACITY_ENV),
                DEFAULT_SESSION_CAPACITY,
                SESSION_CAPACITY_ENV,
            ),
            max_upload_bytes: parse_or(
                var(MAX_UPLOAD_BYTES_ENV),
                DEFAULT_MAX_UPLOAD_BYTES,
                MAX_UPLOAD_BYTES_ENV,
            ),
            cors_origins,
            tls,
        })
    }

    /// Path of the metadata database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

/// Parse a numeric variable, falling back to `default` when absent or malformed.
fn parse_or<T: std::str::FromStr + Copy>(value: Option<String>, default: T, name: &str) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = %name, value = %raw, "Ignoring malformed value, using default");
            default
        }),
    }
}

/// Validate an http(s) URL, returning it without a trailing slash.
fn checked_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { var, source })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme { var, value });
    }
    Ok(value.trim_end_matches('/').to_string())
}
