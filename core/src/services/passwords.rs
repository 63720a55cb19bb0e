// bazaar/src/services/passwords.rs

//! Argon2 password hashing for user accounts.

use crate::error::{BazaarError, BazaarResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::{debug, error, instrument};

/// Hashes `password` with a fresh random salt and default Argon2 parameters.
#[instrument(name = "passwords::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> BazaarResult<String> {
  if password.is_empty() {
    return Err(BazaarError::validation("password: must not be empty"));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      BazaarError::Infrastructure(format!("password hashing failed: {}", e))
    })
}

/// `Ok(false)` on a wrong password; errors only when the stored hash is unusable.
#[instrument(name = "passwords::verify_password", skip_all, err(Display), fields(hash_len = stored_hash.len()))]
pub fn verify_password(stored_hash: &str, provided: &str) -> BazaarResult<bool> {
  if provided.is_empty() {
    return Ok(false);
  }
  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Stored password hash does not parse.");
    BazaarError::Infrastructure(format!("invalid stored password hash: {}", e))
  })?;
  match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password mismatch.");
      Ok(false)
    }
    Err(e) => Err(BazaarError::Infrastructure(format!("password verification failed: {}", e))),
  }
}
