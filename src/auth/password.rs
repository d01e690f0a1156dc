//! Argon2id password storage in PHC string form.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

use crate::error::AppError;

/// Hash compared against when the username does not exist, so a failed
/// login costs one Argon2 run either way.
static UNKNOWN_USER_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("unknown-user-placeholder").ok());

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    match Argon2::default().hash_password(password.as_bytes(), &salt) {
        Ok(phc) => Ok(phc.to_string()),
        Err(err) => Err(AppError::internal(format!("password hashing failed: {err}"))),
    }
}

/// False for a wrong password and for anything that is not a PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Spend the same work as a real check for a login naming no account.
/// Always false.
pub fn verify_unknown_user(password: &str) -> bool {
    if let Some(stored) = UNKNOWN_USER_HASH.as_deref() {
        verify_password(password, stored);
    }
    false
}
