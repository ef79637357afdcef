//! Error types for the identity layer.

use taleforge_protocol::{ErrorKind, ProtocolError};
use taleforge_store::StoreError;

/// Errors that can occur during registration, login, and token handling.
///
/// These cover the full lifecycle of an account: registering, confirming,
/// authenticating, editing, and removing it.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The input didn't pass validation (e.g. a malformed email).
    #[error(transparent)]
    InvalidInput(#[from] ProtocolError),

    /// A user with this email is already registered.
    #[error("a user with this email already exists")]
    AlreadyExists,

    /// The named thing (user, token, ...) doesn't exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The password didn't verify against the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The access token is unknown or past its expiry.
    #[error("invalid access token")]
    InvalidToken,

    /// The email link is older than the configured TTL.
    /// Expired links are purged and can't be retried.
    #[error("email token expired")]
    Expired,

    /// Every attempt collided on a generated identifier.
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// The credential hasher failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// A store round trip failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IdentityError {
    /// The failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::AlreadyExists => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidCredentials | Self::InvalidToken => ErrorKind::Unauthorized,
            Self::Expired => ErrorKind::Expired,
            Self::RetriesExhausted { .. } | Self::Hashing(_) | Self::Store(_) => {
                ErrorKind::InternalError
            }
        }
    }
}
