//! Password verification using Argon2id.

use argon2::{Argon2, PasswordVerifier};

use crate::error::WorkflowError;

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// `pepper`, when given, is prepended to the password and must match the
/// pepper used at hashing time. Parameters are read from the hash itself.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, WorkflowError> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| WorkflowError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(WorkflowError::Crypto(format!("verify error: {e}"))),
    }
}

/// Check a new password against the configured minimum length.
pub fn check_strength(password: &str, min_len: usize) -> Result<(), WorkflowError> {
    if password.chars().count() < min_len {
        return Err(WorkflowError::WeakPassword { min: min_len });
    }
    Ok(())
}
