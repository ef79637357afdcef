//! Error types for the protocol layer, plus the shared failure taxonomy.
//!
//! Each crate in Taleforge defines its own error enum. This keeps errors
//! specific and meaningful: when you see a `ProtocolError`, you know the
//! problem is in the shape of the input, not in the store or in the
//! credential checks.
//!
//! Every one of those enums also reports an [`ErrorKind`]. The kind is
//! the stable half of a failure: callers branch on it, render it as a
//! status, and never have to match on crate-specific variants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur while validating raw input.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The string is not a syntactically valid `local@domain.tld` address.
    #[error("invalid email format: {0}")]
    InvalidEmail(String),
}

impl ProtocolError {
    /// The failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEmail(_) => ErrorKind::InvalidInput,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// The stable failure taxonomy of the core.
///
/// The core never talks HTTP, but every kind carries a status hint so a
/// routing layer can map failures without a lookup table of its own.
///
/// `#[serde(rename_all = "snake_case")]` makes the JSON representation
/// `"not_found"` rather than `"NotFound"`, matching [`ErrorKind::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, e.g. an email that doesn't parse.
    InvalidInput,
    /// A user with this email is already registered.
    AlreadyExists,
    /// Missing user, token, story or session.
    NotFound,
    /// Bad credentials or an unknown access token.
    Unauthorized,
    /// A stale email token.
    Expired,
    /// Exhausted retries or a store failure.
    InternalError,
}

impl ErrorKind {
    /// The HTTP-style status a caller should render for this kind.
    pub fn status(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::AlreadyExists => 409,
            Self::NotFound => 404,
            Self::Unauthorized | Self::Expired => 401,
            Self::InternalError => 500,
        }
    }

    /// The machine-readable name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Expired => "expired",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
