pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod keys;
pub mod password;
pub mod session;

use api::create_api_router;
use auth::CookieSettings;
use axum::{Router, routing::get};
use db::Database;
use jwt::TokenIssuer;
use keys::KeyMaterial;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Access token key pair and refresh token secret, loaded at startup
    pub keys: Arc<KeyMaterial>,
    /// Attributes for the auth cookies
    pub cookies: CookieSettings,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(TokenIssuer::new(config.keys.clone()));

    let api_router = create_api_router(config.db.clone(), jwt, config.cookies.clone());

    Router::new()
        .route("/", get(welcome))
        .merge(api_router)
}

async fn welcome() -> &'static str {
    "Welcome to auth service."
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    Ok((handle, local_addr))
}
