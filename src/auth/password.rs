use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum PasswordError {
    /// The plaintext could not be fed to the hash function.
    #[error("password could not be encoded: {0}")]
    Encoding(String),
    /// The stored value is not an Argon2 PHC string.
    #[error("malformed password hash: {0}")]
    MalformedHash(String),
    /// The blocking hashing task panicked or was cancelled.
    #[error("password hashing task failed: {0}")]
    Worker(String),
}

fn worker_failed(e: tokio::task::JoinError) -> PasswordError {
    error!(error = %e, "password hashing task failed");
    PasswordError::Worker(e.to_string())
}

/// [`hash_password`] on the blocking thread pool.
pub async fn hash_password_blocking(plain: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(worker_failed)?
}

/// [`verify_password`] on the blocking thread pool.
pub async fn verify_password_blocking(plain: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(worker_failed)?
}

/// Hash a plaintext password into an Argon2id PHC string with a fresh salt.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Encoding(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Check `plain` against a PHC string produced by [`hash_password`].
///
/// A well-formed hash of a different password yields `Ok(false)`. Anything
/// that is not an Argon2 PHC string is reported as `MalformedHash`.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::MalformedHash(e.to_string())
    })?;

    if Algorithm::try_from(parsed.algorithm).is_err() {
        error!(algorithm = %parsed.algorithm, "hash is not argon2");
        return Err(PasswordError::MalformedHash(format!(
            "unsupported algorithm {}",
            parsed.algorithm
        )));
    }

    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, "argon2 verify_password error");
            Err(PasswordError::MalformedHash(e.to_string()))
        }
    }
}
