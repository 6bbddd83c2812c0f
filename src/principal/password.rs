//! Password hashing (Argon2id) and strength rules.

use crate::error::{AuthError, AuthResult};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;

const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password into a PHC string.
///
/// # Errors
/// Returns `Internal` if Argon2 fails to produce a hash.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Internal("failed to hash password".to_string()))
}

/// Check a password against a stored PHC string. A malformed hash never matches.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// At least six characters with an uppercase letter, a lowercase letter and a digit.
///
/// # Errors
/// Returns `InvalidInput` describing the rule.
pub fn validate_strength(password: &str) -> AuthResult<()> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_upper && has_lower && has_digit {
        Ok(())
    } else {
        Err(AuthError::invalid_input(
            "password must be at least 6 characters and contain upper, lower and digit",
        ))
    }
}
