//! Password hashing
//!
//! Thin wrapper over bcrypt. Every digest embeds its own random salt, so two
//! hashes of the same password never compare equal as strings.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// bcrypt work factor
#[cfg(not(test))]
const BCRYPT_COST: u32 = 12;

#[cfg(test)]
const BCRYPT_COST: u32 = 4;

/// Longest password bcrypt reads; bytes past this are silently ignored
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Length of generated passwords for federated accounts
const RANDOM_PASSWORD_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(#[from] bcrypt::BcryptError),
}

/// Hash a plaintext password
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(plaintext, BCRYPT_COST)?)
}

/// Check a plaintext password against a stored digest
///
/// A malformed digest simply fails the check.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    bcrypt::verify(plaintext, digest).unwrap_or(false)
}

/// Generate an unguessable password for accounts that never log in with one
pub fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_PASSWORD_LEN)
        .map(char::from)
        .collect()
}
