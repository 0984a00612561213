//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use gatehouse::{
    ServerConfig,
    auth::CookieSettings,
    create_app,
    db::{Database, NewUser, Role},
    jwt::TokenIssuer,
    keys::{KeyMaterial, PemPair, generate_rsa_pem_pair},
    password,
    session::{SessionTokens, start_session},
};

pub const REFRESH_SECRET: &[u8] = b"integration-test-refresh-secret-0123456789";

/// RSA generation is slow; share one pair per test binary.
pub fn test_pem_pair() -> &'static PemPair {
    static PAIR: OnceLock<PemPair> = OnceLock::new();
    PAIR.get_or_init(|| generate_rsa_pem_pair().expect("Failed to generate key pair"))
}

pub fn test_keys() -> Arc<KeyMaterial> {
    let pair = test_pem_pair();
    Arc::new(
        KeyMaterial::from_pem(&pair.private_pem, &pair.public_pem, REFRESH_SECRET)
            .expect("Invalid test keys"),
    )
}

/// Create a test app and return (app, db, token issuer sharing the app's keys).
pub async fn create_test_app() -> (Router, Database, Arc<TokenIssuer>) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let keys = test_keys();
    let config = ServerConfig {
        db: db.clone(),
        keys: keys.clone(),
        cookies: CookieSettings::default(),
    };
    (create_app(&config), db, Arc::new(TokenIssuer::new(keys)))
}

/// Insert a user with a real bcrypt hash and return its id.
pub async fn seed_user(db: &Database, email: &str, plaintext: &str, role: Role) -> i64 {
    let hash = password::hash(plaintext).expect("Failed to hash password");
    db.users()
        .create(&NewUser {
            first_name: "Test",
            last_name: "User",
            email,
            password_hash: &hash,
            role,
            tenant_id: None,
        })
        .await
        .expect("Failed to create user")
}

/// Seed a user and issue a token pair for them.
pub async fn authenticated_user(
    db: &Database,
    jwt: &TokenIssuer,
    email: &str,
    role: Role,
) -> (i64, SessionTokens) {
    let id = seed_user(db, email, "secret-password", role).await;
    let session = start_session(jwt, db, id, role)
        .await
        .expect("Failed to start session");
    (id, session)
}

/// `Cookie` header value carrying the given access token.
pub fn access_cookie(token: &str) -> String {
    format!("accessToken={}", token)
}

/// `Cookie` header value carrying the given refresh token.
pub fn refresh_cookie(token: &str) -> String {
    format!("refreshToken={}", token)
}

/// `Cookie` header value carrying a whole session.
pub fn session_cookie(session: &SessionTokens) -> String {
    format!(
        "accessToken={}; refreshToken={}",
        session.access.token, session.refresh.token
    )
}

/// JSON request with an optional `Cookie` header.
pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Bodyless request with an optional `Cookie` header.
pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Extract all Set-Cookie headers from a response.
pub fn extract_set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of the named cookie among Set-Cookie headers.
pub fn set_cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies.iter().find_map(|c| {
        c.strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or("").to_string())
    })
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
