//! Unified error type for Taleforge.

use serde::{Deserialize, Serialize};
use taleforge_identity::IdentityError;
use taleforge_protocol::{ErrorKind, ProtocolError};
use taleforge_saves::SaveError;
use taleforge_store::StoreError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `taleforge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TaleforgeError {
    /// Malformed input (e.g. an email that doesn't parse).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A store round trip failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Registration, login, or token handling failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Saving or loading a playthrough failed.
    #[error(transparent)]
    Save(#[from] SaveError),

    /// The environment held an unusable setting.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TaleforgeError {
    /// The failure category, delegated to the wrapped error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Identity(e) => e.kind(),
            Self::Save(e) => e.kind(),
            Self::Config(e) => e.kind(),
        }
    }

    /// A caller-facing rendering of this error.
    ///
    /// Internal failures are logged in full here and rendered with a
    /// generic message, so store details never reach a client.
    pub fn failure(&self) -> Failure {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::InternalError => {
                tracing::error!(error = %self, "internal failure");
                "internal error".to_owned()
            }
            _ => self.to_string(),
        };
        Failure { kind, message }
    }
}

/// What a routing layer renders for a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    /// The HTTP-style status for this failure.
    pub fn status(&self) -> u16 {
        self.kind.status()
    }
}
