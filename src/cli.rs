//! CLI argument parsing, validation, and startup helpers.

use std::path::PathBuf;

use crate::ServerConfig;
use crate::auth::CookieSettings;
use crate::db::Database;
use crate::keys::{KeyMaterial, KeySource, REFRESH_SECRET_ENV, SecretSource, write_key_pair};
use clap::Parser;
use tracing::{error, info};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gatehouse",
    about = "Multi-tenant authentication and user management service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5501")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "gatehouse.db")]
    pub database: String,

    /// PEM file with the RSA private key for access tokens. Without it the
    /// key is read from the PRIVATE_KEY env var
    #[arg(long, requires = "public_key_file")]
    pub private_key_file: Option<PathBuf>,

    /// PEM file with the RSA public key for access tokens. Without it the
    /// key is read from the PUBLIC_KEY env var
    #[arg(long, requires = "private_key_file")]
    pub public_key_file: Option<PathBuf>,

    /// Path to file containing the refresh token secret. Prefer using
    /// REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<PathBuf>,

    /// Domain attribute for auth cookies
    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Set the Secure flag on auth cookies (use behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Write a new RSA key pair (private.pem, public.pem) into DIR and exit
    #[arg(long, value_name = "DIR")]
    pub generate_keys: Option<PathBuf>,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Where to load the RSA key pair and refresh secret from, given the
/// arguments. The env var wins over the secret file when both are present.
pub fn key_sources(args: &Args) -> (KeySource, SecretSource) {
    let keys = match (&args.private_key_file, &args.public_key_file) {
        (Some(private), Some(public)) => KeySource::Files {
            private: private.clone(),
            public: public.clone(),
        },
        _ => KeySource::Env,
    };

    let secret = match &args.refresh_secret_file {
        Some(path) if std::env::var_os(REFRESH_SECRET_ENV).is_none() => {
            SecretSource::File(path.clone())
        }
        _ => SecretSource::Env,
    };

    (keys, secret)
}

/// Load signing keys. Returns None and logs an error if any key is missing
/// or unusable.
pub fn load_keys(args: &Args) -> Option<KeyMaterial> {
    let (keys, secret) = key_sources(args);
    match KeyMaterial::load(&keys, &secret) {
        Ok(material) => {
            info!("Signing keys loaded");
            Some(material)
        }
        Err(e) => {
            error!(error = %e, "Failed to load signing keys");
            None
        }
    }
}

/// Handle the --generate-keys flag: write a fresh key pair and print where it
/// went. Returns false if the pair could not be written.
pub fn handle_generate_keys(dir: &std::path::Path) -> bool {
    match write_key_pair(dir) {
        Ok((private, public)) => {
            println!("Private key: {}", private.display());
            println!("Public key: {}", public.display());
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to generate key pair");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, keys: KeyMaterial) -> ServerConfig {
    ServerConfig {
        db,
        keys: std::sync::Arc::new(keys),
        cookies: CookieSettings {
            secure: args.secure_cookies,
            domain: args.cookie_domain.clone(),
        },
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
