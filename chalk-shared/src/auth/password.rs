/// Argon2id password hashing
///
/// Hashes are PHC strings carrying their own parameters, so verification
/// keeps working if the parameters below change.
///
/// Hashing is deliberately slow. Async callers use [`hash`] and [`verify`],
/// which run on the blocking pool instead of stalling the runtime.
///
/// # Example
///
/// ```
/// use chalk_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), chalk_shared::auth::password::PasswordError> {
/// let hash = hash_password("correct horse battery staple")?;
/// assert!(verify_password("correct horse battery staple", &hash)?);
/// assert!(!verify_password("Tr0ub4dor&3", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};

/// Longest accepted password, in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password exceeds {MAX_PASSWORD_BYTES} bytes")]
    TooLong,

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("invalid password hash: {0}")]
    InvalidHash(String),

    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    // 64 MiB, 3 passes, 4 lanes
    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh random salt
///
/// # Errors
///
/// - [`PasswordError::TooLong`] above [`MAX_PASSWORD_BYTES`]
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC hash
///
/// `Ok(false)` means a wrong password; an unparsable hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::InvalidHash(e.to_string())),
    }
}

/// [`hash_password`] on the blocking pool
pub async fn hash(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// [`verify_password`] on the blocking pool
pub async fn verify(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
}
