//! Signing key material, loaded once at startup.
//!
//! Access tokens are signed with an RSA private key and verified with the
//! matching public key. Refresh tokens are signed with a shared HMAC secret
//! that never leaves this service. Any problem here is fatal: the server must
//! not start without usable keys.

use std::path::{Path, PathBuf};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum length of the refresh token HMAC secret, in bytes.
pub const MIN_REFRESH_SECRET_LENGTH: usize = 32;

/// Environment variable holding the PEM-encoded RSA private key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";
/// Environment variable holding the PEM-encoded RSA public key.
pub const PUBLIC_KEY_ENV: &str = "PUBLIC_KEY";
/// Environment variable holding the refresh token secret.
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(Debug, Error)]
pub enum KeyLoadError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid {what}: {source}")]
    InvalidKey {
        what: &'static str,
        source: jsonwebtoken::errors::Error,
    },
    #[error("refresh token secret is shorter than {MIN_REFRESH_SECRET_LENGTH} bytes")]
    SecretTooShort,
    #[error("public key does not verify tokens signed by the private key")]
    Mismatch,
    #[error("key generation failed: {0}")]
    Generate(#[from] openssl::error::ErrorStack),
}

/// Where the RSA key pair comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// PEM files on disk.
    Files { private: PathBuf, public: PathBuf },
    /// PEM text in `PRIVATE_KEY` / `PUBLIC_KEY`.
    Env,
}

/// Where the refresh token secret comes from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    File(PathBuf),
    /// `REFRESH_TOKEN_SECRET`.
    Env,
}

/// Immutable key material shared by the token issuer and verifiers.
pub struct KeyMaterial {
    access_signing: EncodingKey,
    access_verifying: DecodingKey,
    refresh_secret: Vec<u8>,
}

impl KeyMaterial {
    /// Build key material from PEM-encoded RSA keys and a raw secret.
    /// Verifies that the pair belongs together before returning.
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        refresh_secret: &[u8],
    ) -> Result<Self, KeyLoadError> {
        let access_signing =
            EncodingKey::from_rsa_pem(private_pem).map_err(|source| KeyLoadError::InvalidKey {
                what: "private key",
                source,
            })?;
        let access_verifying =
            DecodingKey::from_rsa_pem(public_pem).map_err(|source| KeyLoadError::InvalidKey {
                what: "public key",
                source,
            })?;

        if refresh_secret.len() < MIN_REFRESH_SECRET_LENGTH {
            return Err(KeyLoadError::SecretTooShort);
        }

        let keys = Self {
            access_signing,
            access_verifying,
            refresh_secret: refresh_secret.to_vec(),
        };
        keys.check_pair()?;
        Ok(keys)
    }

    /// Load keys from the configured sources.
    pub fn load(keys: &KeySource, secret: &SecretSource) -> Result<Self, KeyLoadError> {
        let (private_pem, public_pem) = match keys {
            KeySource::Files { private, public } => (read_file(private)?, read_file(public)?),
            KeySource::Env => (
                take_env(PRIVATE_KEY_ENV)?.into_bytes(),
                take_env(PUBLIC_KEY_ENV)?.into_bytes(),
            ),
        };

        let refresh_secret = match secret {
            SecretSource::File(path) => {
                let content = read_file(path)?;
                String::from_utf8_lossy(&content).trim().as_bytes().to_vec()
            }
            SecretSource::Env => take_env(REFRESH_SECRET_ENV)?.into_bytes(),
        };

        Self::from_pem(&private_pem, &public_pem, &refresh_secret)
    }

    pub fn access_signing_key(&self) -> &EncodingKey {
        &self.access_signing
    }

    pub fn access_verifying_key(&self) -> &DecodingKey {
        &self.access_verifying
    }

    pub fn refresh_secret(&self) -> &[u8] {
        &self.refresh_secret
    }

    /// Sign a throwaway token with the private key and verify it with the
    /// public key. Catches mismatched pairs and keys that parse but cannot sign.
    fn check_pair(&self) -> Result<(), KeyLoadError> {
        #[derive(Serialize, Deserialize)]
        struct Probe {
            sub: String,
            exp: u64,
        }

        let probe = Probe {
            sub: "key-check".to_string(),
            exp: u64::MAX / 2,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &probe,
            &self.access_signing,
        )
        .map_err(|source| KeyLoadError::InvalidKey {
            what: "private key",
            source,
        })?;

        let validation = Validation::new(Algorithm::RS256);
        jsonwebtoken::decode::<Probe>(&token, &self.access_verifying, &validation)
            .map(|_| ())
            .map_err(|_| KeyLoadError::Mismatch)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, KeyLoadError> {
    std::fs::read(path).map_err(|source| KeyLoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a secret from the environment and clear it so it does not leak into
/// child processes or crash dumps.
fn take_env(name: &'static str) -> Result<String, KeyLoadError> {
    let value = std::env::var(name).map_err(|_| KeyLoadError::Missing(name))?;
    // SAFETY: runs once during startup, before the listener is bound. The
    // runtime's worker threads exist but run no tasks yet, so nothing reads
    // the environment concurrently.
    unsafe { std::env::remove_var(name) };
    if value.trim().is_empty() {
        return Err(KeyLoadError::Missing(name));
    }
    Ok(value)
}

/// A freshly generated RSA key pair, PEM encoded.
pub struct PemPair {
    /// PKCS#8 private key.
    pub private_pem: Vec<u8>,
    /// SubjectPublicKeyInfo public key.
    pub public_pem: Vec<u8>,
}

/// Generate a 2048-bit RSA key pair for signing access tokens.
pub fn generate_rsa_pem_pair() -> Result<PemPair, KeyLoadError> {
    let rsa = openssl::rsa::Rsa::generate(2048)?;
    let key = openssl::pkey::PKey::from_rsa(rsa)?;
    Ok(PemPair {
        private_pem: key.private_key_to_pem_pkcs8()?,
        public_pem: key.public_key_to_pem()?,
    })
}

/// Write a new key pair as `private.pem` and `public.pem` into `dir`.
pub fn write_key_pair(dir: &Path) -> Result<(PathBuf, PathBuf), KeyLoadError> {
    let pair = generate_rsa_pem_pair()?;
    let private = dir.join("private.pem");
    let public = dir.join("public.pem");

    let write = |path: &Path, bytes: &[u8]| {
        std::fs::write(path, bytes).map_err(|source| KeyLoadError::Write {
            path: path.to_path_buf(),
            source,
        })
    };
    write(&private, &pair.private_pem)?;
    write(&public, &pair.public_pem)?;

    Ok((private, public))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn pair() -> &'static PemPair {
        static PAIR: OnceLock<PemPair> = OnceLock::new();
        PAIR.get_or_init(|| generate_rsa_pem_pair().unwrap())
    }

    #[test]
    fn test_from_pem_accepts_generated_pair() {
        let pair = pair();
        let keys = KeyMaterial::from_pem(&pair.private_pem, &pair.public_pem, SECRET).unwrap();
        assert_eq!(keys.refresh_secret(), SECRET);
    }

    #[test]
    fn test_malformed_private_key_rejected() {
        let pair = pair();
        let result = KeyMaterial::from_pem(b"not a pem", &pair.public_pem, SECRET);
        assert!(matches!(
            result,
            Err(KeyLoadError::InvalidKey {
                what: "private key",
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_public_key_rejected() {
        let pair = pair();
        let result = KeyMaterial::from_pem(&pair.private_pem, b"garbage", SECRET);
        assert!(matches!(
            result,
            Err(KeyLoadError::InvalidKey {
                what: "public key",
                ..
            })
        ));
    }

    #[test]
    fn test_short_secret_rejected() {
        let pair = pair();
        let result = KeyMaterial::from_pem(&pair.private_pem, &pair.public_pem, b"short");
        assert!(matches!(result, Err(KeyLoadError::SecretTooShort)));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let pair = pair();
        let other = generate_rsa_pem_pair().unwrap();
        let result = KeyMaterial::from_pem(&pair.private_pem, &other.public_pem, SECRET);
        assert!(matches!(result, Err(KeyLoadError::Mismatch)));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let (private, public) = write_key_pair(dir.path()).unwrap();
        let secret_path = dir.path().join("refresh.secret");
        std::fs::write(&secret_path, b"  0123456789abcdef0123456789abcdef\n").unwrap();

        let keys = KeyMaterial::load(
            &KeySource::Files { private, public },
            &SecretSource::File(secret_path),
        )
        .unwrap();
        assert_eq!(keys.refresh_secret(), SECRET);
    }

    #[test]
    fn test_missing_file_reported() {
        let result = KeyMaterial::load(
            &KeySource::Files {
                private: PathBuf::from("/nonexistent/private.pem"),
                public: PathBuf::from("/nonexistent/public.pem"),
            },
            &SecretSource::Env,
        );
        assert!(matches!(result, Err(KeyLoadError::Read { .. })));
    }
}
