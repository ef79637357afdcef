//! Account identity for Taleforge.
//!
//! This crate owns the lifecycle of a user's credentials:
//!
//! 1. **Registration** — a pending email token, then confirmation into a
//!    [`User`](taleforge_protocol::User) with a first access token
//! 2. **Authentication** — login, logout, and access-token validation
//! 3. **Account edits** — profile updates, activation, hard delete
//! 4. **Password reset** — single-use reset links that rotate on use
//!
//! Every operation runs in exactly one store transaction per attempt
//! (see [`with_retry`]) so a failure never leaves partial writes behind.
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)      ← composes identity and saves, maps errors
//!     ↕
//! Identity Layer (this crate)  ← token and account lifecycle
//!     ↕
//! Store Layer (below) ← transactions over users and tokens
//! ```
//!
//! # Hooks
//!
//! Hashing, token generation, and the clock are injected through
//! [`CredentialHasher`], [`TokenGenerator`], and
//! [`Clock`](taleforge_protocol::Clock), so tests can make collisions and
//! expiry deterministic.

mod config;
mod error;
mod hasher;
mod manager;
mod retry;
mod tokens;

pub use config::IdentityConfig;
pub use error::IdentityError;
pub use hasher::{Argon2Hasher, CredentialHasher};
pub use manager::IdentityManager;
pub use retry::{RetryPolicy, with_retry};
pub use tokens::{RandomTokens, TokenGenerator};
