// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Role,
    error::ApiError,
    models::{
        CertificateResponse, FolderContentResponse, GoogleLoginRequest, LoginExchangeRequest,
        LoginResponse, MessageResponse, RegisterCertificateForm, VerifyDocumentForm,
        VerifyResponse,
    },
    state::AppState,
};

pub mod auth;
pub mod certificates;
pub mod folders;
pub mod health;
pub mod upload;

/// Run blocking storage or database work off the async runtime.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "Blocking task failed");
        ApiError::internal("Internal task failure")
    })?
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config.cors_origins);

    let api_routes = Router::new()
        .route("/register", post(certificates::register_certificate))
        .route("/verify", post(certificates::verify_document))
        .route("/certificates", get(certificates::list_certificates))
        .route(
            "/certificates/{document_hash}",
            get(certificates::get_certificate),
        )
        .route("/folders", get(folders::list_folders))
        .route(
            "/folders/{folder_name}/certificates",
            get(folders::list_folder_certificates),
        )
        .route(
            "/folders/{folder_name}/files",
            get(folders::list_folder_files),
        )
        .route("/auth/login-exchange", post(auth::login_exchange))
        .route("/auth/google-login", post(auth::google_login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/user", get(auth::current_user))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        certificates::register_certificate,
        certificates::verify_document,
        certificates::get_certificate,
        certificates::list_certificates,
        folders::list_folders,
        folders::list_folder_certificates,
        folders::list_folder_files,
        auth::login_exchange,
        auth::google_login,
        auth::logout,
        auth::current_user,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            CertificateResponse,
            RegisterCertificateForm,
            VerifyDocumentForm,
            VerifyResponse,
            LoginExchangeRequest,
            GoogleLoginRequest,
            LoginResponse,
            MessageResponse,
            FolderContentResponse,
            Role,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Certificates", description = "Document registration, verification and lookup"),
        (name = "Folders", description = "Browsing an institution's folders"),
        (name = "Auth", description = "Google sign-in and sessions"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::upload::test_forms;
    use super::*;
    use crate::auth::exchange::test_endpoint;
    use crate::auth::verifier::test_tokens::{
        google_id_token, production_verifier, signed_google_id_token,
    };
    use crate::config::AppConfig;
    use crate::hashing::hash_bytes;
    use crate::state::{test_state, AuthConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, Response, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const REGISTRAR: &str = "registrar@acme.edu";
    const DIPLOMA: &[u8] = b"%PDF-1.7\nDiploma of Applied Science\nAwarded 2024\n%%EOF";

    fn test_app() -> (Router, AppState, TempDir) {
        let (state, temp) = test_state();
        (router(state.clone()), state, temp)
    }

    async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_request(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn form_request(uri: &str, body: Vec<u8>, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, test_forms::content_type());
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    /// Sign in and return the `Cookie` header value for the new session.
    async fn login(app: &Router, email: &str) -> String {
        let response = send(
            app,
            json_request(
                "/api/auth/login-exchange",
                json!({ "idToken": google_id_token(email, "Registrar") }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));

        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn register(
        app: &Router,
        cookie: Option<&str>,
        file: Option<(&str, &[u8])>,
        folder: Option<&str>,
    ) -> Response<Body> {
        let texts: Vec<(&str, &str)> = folder.map(|f| vec![("folderName", f)]).unwrap_or_default();
        send(
            app,
            form_request("/api/register", test_forms::body(file, &texts), cookie),
        )
        .await
    }

    #[tokio::test]
    async fn register_then_browse_and_look_up() {
        let (app, _state, _temp) = test_app();
        let cookie = login(&app, REGISTRAR).await;

        let response = register(&app, Some(&cookie), Some(("report.pdf", DIPLOMA)), Some("2024")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        let hash = body["documentHash"].as_str().unwrap().to_string();
        assert_eq!(hash, hash_bytes(DIPLOMA));
        assert_eq!(hash.len(), 64);
        assert_eq!(body["issuer"], REGISTRAR);
        assert_eq!(body["folderName"], "2024");
        assert_eq!(body["originalFileName"], "report.pdf");
        assert_eq!(body["localFilePath"], format!("{REGISTRAR}/2024/report.pdf"));
        assert!(body["message"].is_string());

        let folders = json_body(send(&app, get_request("/api/folders", Some(&cookie))).await).await;
        assert_eq!(folders, json!(["2024"]));

        let records = json_body(
            send(&app, get_request("/api/folders/2024/certificates", Some(&cookie))).await,
        )
        .await;
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["documentHash"], hash);

        let files = json_body(
            send(&app, get_request("/api/folders/2024/files", Some(&cookie))).await,
        )
        .await;
        assert_eq!(files, json!({ "folderName": "2024", "fileNames": ["report.pdf"] }));

        let all = json_body(send(&app, get_request("/api/certificates", Some(&cookie))).await).await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        // Lookup by hash is public
        let response = send(&app, get_request(&format!("/api/certificates/{hash}"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["issuer"], REGISTRAR);
    }

    #[tokio::test]
    async fn duplicate_document_is_conflict() {
        let (app, _state, _temp) = test_app();
        let cookie = login(&app, REGISTRAR).await;

        let first = register(&app, Some(&cookie), Some(("report.pdf", DIPLOMA)), Some("2024")).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = register(&app, Some(&cookie), Some(("copy.pdf", DIPLOMA)), Some("2025")).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert!(json_body(second).await["error"].is_string());

        let folders = json_body(send(&app, get_request("/api/folders", Some(&cookie))).await).await;
        assert_eq!(folders, json!(["2024"]));
        let all = json_body(send(&app, get_request("/api/certificates", Some(&cookie))).await).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn verify_matches_registration_and_detects_tampering() {
        let (app, _state, _temp) = test_app();
        let cookie = login(&app, REGISTRAR).await;

        let registered = json_body(
            register(&app, Some(&cookie), Some(("report.pdf", DIPLOMA)), Some("2024")).await,
        )
        .await;

        let response = send(
            &app,
            form_request("/api/verify", test_forms::body(Some(("any-name.pdf", DIPLOMA)), &[]), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let verified = json_body(response).await;
        assert_eq!(verified["documentHash"], registered["documentHash"]);

        let mut tampered = DIPLOMA.to_vec();
        tampered[10] ^= 0x01;
        let verified = json_body(
            send(
                &app,
                form_request("/api/verify", test_forms::body(Some(("report.pdf", tampered.as_slice())), &[]), None),
            )
            .await,
        )
        .await;
        assert_ne!(verified["documentHash"], registered["documentHash"]);
    }

    #[tokio::test]
    async fn verify_rejects_empty_or_missing_file() {
        let (app, _state, _temp) = test_app();

        let empty = send(
            &app,
            form_request("/api/verify", test_forms::body(Some(("empty.pdf", &b""[..])), &[]), None),
        )
        .await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let missing = send(&app, form_request("/api/verify", test_forms::body(None, &[]), None)).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_requires_session() {
        let (app, _state, _temp) = test_app();

        let response = register(&app, None, Some(("report.pdf", DIPLOMA)), Some("2024")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "missing_session");

        let response = send(&app, get_request("/api/folders", Some("CERTS_SESSION=forged"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn regular_users_are_forbidden() {
        let (app, state, _temp) = test_app();
        let id = state
            .sessions
            .create("student@acme.edu", "Student", Role::Regular)
            .unwrap();
        let cookie = format!("CERTS_SESSION={id}");

        let response = register(&app, Some(&cookie), Some(("report.pdf", DIPLOMA)), Some("2024")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&app, get_request("/api/folders", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn register_validates_file_then_folder() {
        let (app, _state, _temp) = test_app();
        let cookie = login(&app, REGISTRAR).await;

        let response = register(&app, Some(&cookie), Some(("empty.pdf", &b""[..])), Some("2024")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = register(&app, Some(&cookie), None, Some("2024")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = register(&app, Some(&cookie), Some(("a.pdf", DIPLOMA)), Some("   ")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = register(&app, Some(&cookie), Some(("a.pdf", DIPLOMA)), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = register(&app, Some(&cookie), Some(("a.pdf", DIPLOMA)), Some("../other")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let folders = json_body(send(&app, get_request("/api/folders", Some(&cookie))).await).await;
        assert_eq!(folders, json!([]));
    }

    #[tokio::test]
    async fn file_names_are_sanitized_on_disk() {
        let (app, _state, _temp) = test_app();
        let cookie = login(&app, REGISTRAR).await;

        let body = json_body(
            register(&app, Some(&cookie), Some(("a b@c!.pdf", DIPLOMA)), Some("2024")).await,
        )
        .await;
        assert_eq!(body["originalFileName"], "a b@c!.pdf");
        assert_eq!(body["localFilePath"], format!("{REGISTRAR}/2024/a_b_c_.pdf"));
    }

    #[tokio::test]
    async fn dot_leading_upload_is_listed() {
        let (app, _state, _temp) = test_app();
        let cookie = login(&app, REGISTRAR).await;

        let body = json_body(
            register(&app, Some(&cookie), Some((".transcript.pdf", DIPLOMA)), Some("2024")).await,
        )
        .await;
        assert_eq!(body["localFilePath"], format!("{REGISTRAR}/2024/_transcript.pdf"));

        let files = json_body(
            send(&app, get_request("/api/folders/2024/files", Some(&cookie))).await,
        )
        .await;
        assert_eq!(files["fileNames"], json!(["_transcript.pdf"]));
    }

    #[tokio::test]
    async fn large_upload_is_staged_and_stored_intact() {
        let (app, state, _temp) = test_app();
        let cookie = login(&app, REGISTRAR).await;

        let scan: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
        let response = register(&app, Some(&cookie), Some(("scan.tiff", scan.as_slice())), Some("2024")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["documentHash"], hash_bytes(&scan));

        let stored = std::fs::read(state.files.paths().file_path(REGISTRAR, "2024", "scan.tiff")).unwrap();
        assert_eq!(stored, scan);

        let staging = std::fs::read_dir(state.files.paths().staging_dir()).unwrap().count();
        assert_eq!(staging, 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (state, _temp) = test_state();
        let mut state = state;
        state.config = Arc::new(AppConfig {
            max_upload_bytes: 1024,
            ..(*state.config).clone()
        });
        let app = router(state);
        let cookie = login(&app, REGISTRAR).await;

        let big = vec![7u8; 8 * 1024];
        let response = register(&app, Some(&cookie), Some(("big.bin", big.as_slice())), Some("2024")).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn certificate_lookup_errors() {
        let (app, _state, _temp) = test_app();

        let response = send(&app, get_request("/api/certificates/not-a-hash", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unknown = "0".repeat(64);
        let response = send(&app, get_request(&format!("/api/certificates/{unknown}"), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_session_lifecycle() {
        let (app, _state, _temp) = test_app();

        let guest = json_body(send(&app, get_request("/api/auth/user", None)).await).await;
        assert_eq!(
            guest,
            json!({ "name": "Guest", "email": null, "role": "ANONYMOUS", "authenticated": false })
        );

        let cookie = login(&app, REGISTRAR).await;
        let me = json_body(send(&app, get_request("/api/auth/user", Some(&cookie))).await).await;
        assert_eq!(me["email"], REGISTRAR);
        assert_eq!(me["role"], "INSTITUTION");
        assert_eq!(me["authenticated"], true);

        let response = send(&app, json_request("/api/auth/logout", json!({}), Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "Logged out");

        let after = json_body(send(&app, get_request("/api/auth/user", Some(&cookie))).await).await;
        assert_eq!(after["authenticated"], false);

        // Logging out without a session still succeeds
        let response = send(&app, json_request("/api/auth/logout", json!({}), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Router wired to a local JWKS endpoint and a local token endpoint.
    async fn production_app() -> (Router, TempDir) {
        let (state, temp) = test_state();
        let token_url =
            test_endpoint::serve_token_endpoint(&signed_google_id_token(REGISTRAR, "Registrar")).await;
        let state = state.with_auth_config(AuthConfig {
            verifier: production_verifier().await,
            exchange: Some(test_endpoint::client(&token_url)),
        });
        (router(state), temp)
    }

    async fn exchange_code(app: &Router, code: &str) -> Response<Body> {
        send(
            app,
            json_request("/api/auth/login-exchange", json!({ "code": code }), None),
        )
        .await
    }

    #[tokio::test]
    async fn signed_id_token_signs_in() {
        let (app, _temp) = production_app().await;

        let token = signed_google_id_token(REGISTRAR, "Registrar");
        let response = send(
            &app,
            json_request("/api/auth/login-exchange", json!({ "idToken": token }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        assert_eq!(json_body(response).await["email"], REGISTRAR);

        // Signature checks are on: an unsigned token no longer passes
        let response = send(
            &app,
            json_request(
                "/api/auth/login-exchange",
                json!({ "idToken": google_id_token(REGISTRAR, "Registrar") }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authorization_code_signs_in() {
        let (app, _temp) = production_app().await;

        let response = exchange_code(&app, "good").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        let body = json_body(response).await;
        assert_eq!(body["email"], REGISTRAR);
        assert_eq!(body["role"], "INSTITUTION");
        assert_eq!(body["authenticated"], true);
    }

    #[tokio::test]
    async fn code_exchange_failures_map_to_status() {
        let (app, _temp) = production_app().await;

        let response = exchange_code(&app, "stale").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "exchange_rejected");

        let response = exchange_code(&app, "boom").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error_code"], "exchange_failed");

        let response = exchange_code(&app, "empty").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error_code"], "exchange_failed");
    }

    #[tokio::test]
    async fn login_errors() {
        let (app, _state, _temp) = test_app();

        let response = send(&app, json_request("/api/auth/login-exchange", json!({}), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            json_request("/api/auth/login-exchange", json!({ "code": "4/abc" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = send(
            &app,
            json_request("/api/auth/login-exchange", json!({ "idToken": "garbage" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "malformed_token");
    }

    #[tokio::test]
    async fn google_login_alias_signs_in() {
        let (app, _state, _temp) = test_app();

        let response = send(
            &app,
            json_request(
                "/api/auth/google-login",
                json!({ "idToken": google_id_token(REGISTRAR, "Registrar") }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        assert_eq!(json_body(response).await["role"], "INSTITUTION");
    }

    #[tokio::test]
    async fn relogin_replaces_previous_session() {
        let (app, state, _temp) = test_app();

        let first = login(&app, REGISTRAR).await;
        let response = send(
            &app,
            json_request(
                "/api/auth/login-exchange",
                json!({ "idToken": google_id_token(REGISTRAR, "Registrar") }),
                Some(&first),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(state.sessions.len(), 1);
        let response = send(&app, get_request("/api/folders", Some(&first))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_docs_and_request_ids() {
        let (app, _state, _temp) = test_app();

        let response = send(&app, get_request("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-request-id").is_some());

        let response = send(&app, get_request("/health/live", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let spec = json_body(send(&app, get_request("/api-doc/openapi.json", None)).await).await;
        assert!(spec["paths"]["/api/register"].is_object());
        assert!(spec["paths"]["/api/certificates/{document_hash}"].is_object());
    }
}
