//! Users-file password checks.
//!
//! An `internal` password in a users file is either an Argon2 PHC string
//! (`$argon2id$...`) or plaintext.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

const PHC_PREFIX: &str = "$argon2";

/// Hash a plaintext password using Argon2id with a random salt.
///
/// Returns the PHC-formatted hash string, ready to paste into a users file.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a PHC-formatted Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check `candidate` against a stored users-file password.
///
/// A malformed hash fails the check and is logged.
pub fn verify_stored(stored: &str, candidate: &str) -> bool {
    if stored.starts_with(PHC_PREFIX) {
        return match verify_password(candidate, stored) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed password hash in users file");
                false
            }
        };
    }
    !stored.is_empty() && constant_time_eq(stored.as_bytes(), candidate.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_stored(&hash, "correct-horse-battery-staple"));
        assert!(!verify_stored(&hash, "wrong"));
    }

    #[test]
    fn test_plaintext_passwords() {
        assert!(verify_stored("secret", "secret"));
        assert!(!verify_stored("secret", "Secret"));
        assert!(!verify_stored("secret", "secret2"));
        assert!(!verify_stored("", ""));
    }

    #[test]
    fn test_malformed_hash_fails() {
        assert!(!verify_stored("$argon2id$garbage", "anything"));
    }
}
