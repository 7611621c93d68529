//! Password Hashing and Verification
//!
//! - Argon2id hashing, self-salted PHC strings
//! - Zeroization of clear-text input
//! - Registration policy: length plus character-class composition
//!
//! Every call to [`PasswordHasher::hash`] draws a fresh salt, so hashing the
//! same password twice never yields the same string.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version};
use argon2::password_hash::{PasswordHasher as _, SaltString};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Accepted special characters; at least one is required
pub const SPECIAL_CHARACTERS: &str = "@$!%*?&";

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password is required.")]
    Empty,

    #[error("Password must be at least {min} characters.")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters.")]
    TooLong { max: usize, actual: usize },

    #[error("Password contains invalid control characters.")]
    InvalidCharacter,

    #[error(
        "Password must contain at least one uppercase letter, one lowercase letter, one number and one special character."
    )]
    WeakComposition,
}

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid hasher parameters: {0}")]
    InvalidParams(String),
}

impl From<PasswordPolicyError> for AppError {
    fn from(err: PasswordPolicyError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

impl From<PasswordHashError> for AppError {
    fn from(err: PasswordHashError) -> Self {
        AppError::new(ErrorKind::InternalServerError, "Password hashing failed").with_source(err)
    }
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Not `Clone`, and `Debug` output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Validate a password chosen at registration
    ///
    /// Unicode is NFKC-normalized first, then:
    /// - 8 to 128 characters
    /// - no control characters
    /// - at least one lowercase, one uppercase, one digit and one of `@$!%*?&`
    pub fn new(raw: impl Into<String>) -> Result<Self, PasswordPolicyError> {
        let mut raw = raw.into();
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();

        if normalized.trim().is_empty() {
            return Err(PasswordPolicyError::Empty);
        }

        let char_count = normalized.chars().count();
        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }
        if char_count > MAX_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if normalized.chars().any(|ch| ch.is_control()) {
            return Err(PasswordPolicyError::InvalidCharacter);
        }

        if !has_required_classes(&normalized) {
            return Err(PasswordPolicyError::WeakComposition);
        }

        Ok(Self(normalized))
    }

    /// Wrap a password presented at login
    ///
    /// Only emptiness is rejected; policy is for new passwords, and a
    /// policy error here would leak which rule an old password breaks.
    pub fn for_verification(raw: impl Into<String>) -> Result<Self, PasswordPolicyError> {
        let mut raw = raw.into();
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();
        if normalized.is_empty() {
            return Err(PasswordPolicyError::Empty);
        }
        Ok(Self(normalized))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

fn has_required_classes(password: &str) -> bool {
    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut special = false;
    for ch in password.chars() {
        lower |= ch.is_ascii_lowercase();
        upper |= ch.is_ascii_uppercase();
        digit |= ch.is_ascii_digit();
        special |= SPECIAL_CHARACTERS.contains(ch);
    }
    lower && upper && digit && special
}

// ============================================================================
// Hasher
// ============================================================================

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    /// OWASP recommended: m=19456 (19 MiB), t=2, p=1
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HasherConfig {
    /// Lowest cost Argon2 accepts; for tests and local development only
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Password hasher with optional application-wide pepper
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    pepper: Option<Vec<u8>>,
}

impl PasswordHasher {
    pub fn new(config: HasherConfig, pepper: Option<Vec<u8>>) -> Result<Self, PasswordHashError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordHashError::InvalidParams(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            pepper,
        })
    }

    fn peppered(&self, password: &ClearTextPassword) -> Vec<u8> {
        let mut bytes = password.as_bytes().to_vec();
        if let Some(pepper) = &self.pepper {
            bytes.extend_from_slice(pepper);
        }
        bytes
    }

    /// Hash into a PHC string with a fresh random salt
    pub fn hash(&self, password: &ClearTextPassword) -> Result<String, PasswordHashError> {
        let mut bytes = self.peppered(password);
        let salt = SaltString::generate(&mut OsRng);
        let result = self
            .argon2
            .hash_password(&bytes, &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()));
        bytes.zeroize();
        result
    }

    /// Constant-time check of `password` against a stored PHC string
    ///
    /// A malformed stored hash verifies as `false`.
    pub fn verify(&self, password: &ClearTextPassword, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            tracing::warn!("Stored password hash is not a valid PHC string");
            return false;
        };
        let mut bytes = self.peppered(password);
        let ok = self.argon2.verify_password(&bytes, &parsed).is_ok();
        bytes.zeroize();
        ok
    }
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("pepper", &self.pepper.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(HasherConfig::minimal(), None).unwrap()
    }

    #[test]
    fn test_policy_rejects_short_and_long() {
        assert!(matches!(
            ClearTextPassword::new("P@s1"),
            Err(PasswordPolicyError::TooShort { .. })
        ));
        let long = format!("Aa1@{}", "x".repeat(MAX_PASSWORD_LENGTH));
        assert!(matches!(
            ClearTextPassword::new(long),
            Err(PasswordPolicyError::TooLong { .. })
        ));
    }

    #[test]
    fn test_policy_requires_every_class() {
        for weak in ["password1!", "PASSWORD1!", "Password!!", "Password11"] {
            assert_eq!(
                ClearTextPassword::new(weak).unwrap_err(),
                PasswordPolicyError::WeakComposition,
                "{weak} should be rejected"
            );
        }
        assert!(ClearTextPassword::new("P@ssw0rd1").is_ok());
    }

    #[test]
    fn test_policy_rejects_blank_and_control() {
        assert_eq!(
            ClearTextPassword::new("        ").unwrap_err(),
            PasswordPolicyError::Empty
        );
        assert_eq!(
            ClearTextPassword::new("P@ssw0rd\u{0007}").unwrap_err(),
            PasswordPolicyError::InvalidCharacter
        );
    }

    #[test]
    fn test_for_verification_skips_policy() {
        assert!(ClearTextPassword::for_verification("short").is_ok());
        assert!(ClearTextPassword::for_verification("").is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let password = ClearTextPassword::new("P@ssw0rd1").unwrap();
        let hashed = hasher.hash(&password).unwrap();

        assert!(hasher.verify(&password, &hashed));

        let wrong = ClearTextPassword::for_verification("P@ssw0rd2").unwrap();
        assert!(!hasher.verify(&wrong, &hashed));
    }

    #[test]
    fn test_salt_differs_per_call() {
        let hasher = hasher();
        let password = ClearTextPassword::new("P@ssw0rd1").unwrap();
        let a = hasher.hash(&password).unwrap();
        let b = hasher.hash(&password).unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify(&password, &a));
        assert!(hasher.verify(&password, &b));
    }

    #[test]
    fn test_pepper_must_match() {
        let peppered = PasswordHasher::new(HasherConfig::minimal(), Some(b"pepper".to_vec())).unwrap();
        let password = ClearTextPassword::new("P@ssw0rd1").unwrap();
        let hashed = peppered.hash(&password).unwrap();

        assert!(peppered.verify(&password, &hashed));
        assert!(!hasher().verify(&password, &hashed));
    }

    #[test]
    fn test_malformed_hash_is_false() {
        let password = ClearTextPassword::new("P@ssw0rd1").unwrap();
        assert!(!hasher().verify(&password, "not_a_valid_hash"));
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::new("P@ssw0rd1").unwrap();
        let debug_output = format!("{:?}", password);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("P@ssw0rd1"));
    }
}
