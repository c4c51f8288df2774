//! Account authentication.
//!
//! Provides password hashing, session tokens and registration rules.
//!
//! ## Features
//!
//! - Argon2 password hashing (PHC string format)
//! - Random opaque session tokens
//! - Registration checks (required fields, password length and confirmation,
//!   accepted terms)
//!
//! ## Usage
//!
//! ```
//! use huella_core::auth::{hash_password, verify_password};
//!
//! let hash = hash_password("secret123").unwrap();
//! assert!(verify_password("secret123", &hash).unwrap());
//! assert!(!verify_password("wrong", &hash).unwrap());
//! ```

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum password length requirement.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Session lifetime in hours.
pub const SESSION_LIFETIME_HOURS: i64 = 8;

/// Authentication errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// A required registration field is empty.
    #[error("Please fill in all required fields.")]
    MissingFields,

    /// Password is too short.
    #[error("The password must be at least {MIN_PASSWORD_LENGTH} characters long.")]
    PasswordTooShort,

    /// Password and confirmation differ.
    #[error("The passwords do not match.")]
    PasswordMismatch,

    #[error("You must accept the terms and conditions.")]
    TermsNotAccepted,

    /// No account with that username or email.
    #[error("No account exists with that email or username.")]
    UnknownAccount,

    #[error("The password is incorrect.")]
    WrongPassword,

    /// Password hashing failed.
    #[error("failed to hash password: {0}")]
    HashingFailed(String),

    /// Password verification failed (invalid hash format).
    #[error("failed to verify password: {0}")]
    VerificationFailed(String),
}

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// A session token representing an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    /// Create a new random session token: 16 random bytes, unpadded base64.
    pub fn new() -> Self {
        let salt = SaltString::generate(&mut OsRng);
        Self(salt.to_string())
    }

    /// Create a session token from an existing string.
    ///
    /// Used for reconstructing tokens from request headers.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the token as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a password against the length rule.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

/// Hash a password using Argon2.
///
/// Returns the hashed password as a PHC string format. Length rules are
/// the caller's business: see [`validate_password`].
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::HashingFailed(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::VerificationFailed(e.to_string())),
    }
}

/// Self-service sign-up request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub accept_terms: bool,
}

impl Registration {
    /// Check the sign-up rules, in the order users are told about them.
    ///
    /// Uniqueness of username and email is checked by the store.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(AuthError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(&self.password)?;
        if !self.accept_terms {
            return Err(AuthError::TermsNotAccepted);
        }
        Ok(())
    }

    pub fn normalized_username(&self) -> String {
        self.username.trim().to_string()
    }

    /// Emails are stored lowercased.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}
