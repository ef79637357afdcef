//! Error types for the saves layer.

use taleforge_protocol::{ErrorKind, GameSessionId, StoryId, UserId};
use taleforge_store::StoreError;

/// Errors that can occur while saving or loading playthroughs.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The caller owns no session with this id. Sessions owned by someone
    /// else are reported the same way.
    #[error("game session {0} not found")]
    SessionNotFound(GameSessionId),

    /// The story row is missing, or lacks its text or its image.
    #[error("{0} not found")]
    StoryNotFound(StoryId),

    /// The user row doesn't exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// A store round trip failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SaveError {
    /// The failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) | Self::StoryNotFound(_) | Self::UserNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Store(_) => ErrorKind::InternalError,
        }
    }
}
