//! Password hashing hook.
//!
//! The lifecycle manager never hashes passwords itself. It calls a
//! [`CredentialHasher`], so production runs Argon2 while tests plug in
//! something instant and deterministic.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::Rng;

use crate::IdentityError;

/// One-way password hashing with verification.
///
/// # Trait bounds
///
/// - `Send + Sync` → one hasher is shared by every request.
/// - `'static` → it lives as long as the manager that owns it.
pub trait CredentialHasher: Send + Sync + 'static {
    /// Hashes `plaintext` into a self-describing string (salt included).
    ///
    /// # Errors
    /// Returns [`IdentityError::Hashing`] if the primitive fails.
    fn hash(&self, plaintext: &str) -> Result<String, IdentityError>;

    /// Returns `true` if `plaintext` produced `hash`.
    ///
    /// Must run in constant time with respect to the hash contents, and
    /// must return `false` (not panic) for a malformed `hash`.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Argon2id with a random 16-byte salt per hash.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Argon2id with the crate's recommended parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Argon2id with explicit cost parameters.
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

fn salt() -> Result<SaltString, IdentityError> {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    SaltString::encode_b64(&bytes).map_err(|e| IdentityError::Hashing(e.to_string()))
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, IdentityError> {
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt()?)
            .map(|h| h.to_string())
            .map_err(|e| IdentityError::Hashing(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                self.argon2
                    .verify_password(plaintext.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}
