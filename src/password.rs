//! Password hashing with bcrypt.

use thiserror::Error;

/// bcrypt work factor. Changing it only affects newly hashed passwords.
pub const BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The stored hash could not be parsed. Treat as a failed login.
    #[error("stored credential is corrupt: {0}")]
    Corrupt(bcrypt::BcryptError),
    #[error("failed to hash password: {0}")]
    Hash(bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash a password with a random salt. The salt is embedded in the output, so
/// hashing the same password twice gives different strings.
pub fn hash(plaintext: &str) -> Result<String, CredentialError> {
    bcrypt::hash(plaintext, BCRYPT_COST).map_err(CredentialError::Hash)
}

/// Check a password against a stored hash. A mismatch is `Ok(false)`; only a
/// malformed hash is an error.
pub fn verify(plaintext: &str, stored_hash: &str) -> Result<bool, CredentialError> {
    bcrypt::verify(plaintext, stored_hash).map_err(CredentialError::Corrupt)
}

/// [`hash`] on the blocking thread pool.
pub async fn hash_password(plaintext: String) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || hash(&plaintext)).await?
}

/// [`verify`] on the blocking thread pool.
pub async fn verify_password(
    plaintext: String,
    stored_hash: String,
) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || verify(&plaintext, &stored_hash)).await?
}
