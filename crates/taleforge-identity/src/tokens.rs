//! Token and identifier generation hook.

use rand::Rng;
use taleforge_protocol::UserId;

/// Produces the unguessable strings behind email links and access tokens,
/// and the identifiers of new users.
///
/// Collisions are negligible but not assumed impossible: every caller
/// inserts through a unique constraint and retries on violation.
pub trait TokenGenerator: Send + Sync + 'static {
    /// A fresh opaque token.
    fn token(&self) -> String;

    /// A fresh user identifier.
    fn user_id(&self) -> UserId {
        UserId::random()
    }
}

/// 256-bit tokens from the thread-local CSPRNG, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenGenerator for RandomTokens {
    fn token(&self) -> String {
        let bytes: [u8; 32] = rand::rng().random();
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
