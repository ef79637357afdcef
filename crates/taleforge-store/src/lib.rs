//! Relational store abstraction for Taleforge.
//!
//! Provides the [`Store`] and [`Transaction`] traits that the identity and
//! save layers run on, independent of the engine underneath.
//!
//! Every operation of the core opens one transaction, performs its reads
//! and writes through it, and either calls [`Transaction::commit`] or
//! drops it. Dropping a transaction without committing rolls it back, so
//! an early `?` return can never leave a half-applied change behind.
//!
//! # Feature Flags
//!
//! - `memory` (default) — in-process engine ([`MemoryStore`]) with the same
//!   constraint and cascade behaviour as the relational schema.

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::StoreError;
#[cfg(feature = "memory")]
pub use memory::{MemoryStore, MemoryTransaction};

use std::future::Future;

use taleforge_protocol::{
    AccessToken, Email, EmailToken, GameSession, GameSessionId, NewGameSession,
    SceneAppend, StartingStory, StoryId, User, UserChanges, UserId,
};

/// Table names, as reported in [`StoreError`] constraint violations.
pub mod tables {
    pub const USERS: &str = "users";
    pub const EMAIL_TOKENS: &str = "email_tokens";
    pub const ACCESS_TOKENS: &str = "access_tokens";
    pub const GAME_SESSIONS: &str = "game_sessions";
    pub const STARTING_STORIES: &str = "starting_stories";
}

/// Opens transactions against a persistent backend.
///
/// `Send + Sync + 'static` because one store is shared by every request
/// the service handles concurrently.
pub trait Store: Send + Sync + 'static {
    /// The transaction type produced by this store.
    type Tx: Transaction;

    /// Starts a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

/// A unit of work over the four tables of the core.
///
/// Reads observe the transaction's own writes. Nothing is visible to other
/// transactions until [`commit`](Self::commit) succeeds; dropping the
/// transaction discards everything.
///
/// Constraints every implementation enforces:
///
/// - `users.id` and `users.email` are unique
/// - `email_tokens.token` and `email_tokens.email` are unique
/// - `access_tokens.token` is unique
/// - `access_tokens.user_id` and `game_sessions.user_id` reference `users.id`
///   and are removed when the user row is deleted
pub trait Transaction: Send {
    // -- Users --

    /// Point lookup by primary key.
    fn user_by_id(
        &mut self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Point lookup by the unique email column.
    fn user_by_email(
        &mut self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Inserts a user and returns the stored row.
    fn insert_user(
        &mut self,
        user: User,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Applies a sparse update. Returns the updated row, or `None` if no
    /// user has this id. A missing row wins over any constraint the
    /// changes would break.
    fn update_user(
        &mut self,
        id: UserId,
        changes: UserChanges,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Deletes a user and, by cascade, its access tokens and game
    /// sessions. Returns the number of user rows removed.
    fn delete_user(
        &mut self,
        id: UserId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    // -- Email tokens --

    /// Point lookup by token string.
    fn email_token(
        &mut self,
        token: &str,
    ) -> impl Future<Output = Result<Option<EmailToken>, StoreError>> + Send;

    /// Inserts an email token and returns the stored row.
    fn insert_email_token(
        &mut self,
        token: EmailToken,
    ) -> impl Future<Output = Result<EmailToken, StoreError>> + Send;

    /// Replaces the token row held for `replacement.email` in place.
    /// Returns `None` if that email holds no token.
    fn replace_email_token(
        &mut self,
        replacement: EmailToken,
    ) -> impl Future<Output = Result<Option<EmailToken>, StoreError>> + Send;

    /// Deletes every token issued to `email`. Returns the count removed.
    fn delete_email_tokens(
        &mut self,
        email: &Email,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    // -- Access tokens --

    /// Point lookup by token string.
    fn access_token(
        &mut self,
        token: &str,
    ) -> impl Future<Output = Result<Option<AccessToken>, StoreError>> + Send;

    /// Inserts an access token and returns the stored row.
    fn insert_access_token(
        &mut self,
        token: AccessToken,
    ) -> impl Future<Output = Result<AccessToken, StoreError>> + Send;

    /// Deletes one token. Returns the count removed (0 or 1).
    fn delete_access_token(
        &mut self,
        token: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Deletes every token owned by `user`. Returns the count removed.
    fn delete_access_tokens(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    // -- Game sessions --

    /// Inserts a session and returns it with its assigned id.
    fn insert_game_session(
        &mut self,
        session: NewGameSession,
    ) -> impl Future<Output = Result<GameSession, StoreError>> + Send;

    /// Appends scenes to a session owned by `owner` and replaces its other
    /// mutable columns, as one store-side operation.
    ///
    /// The stored sequence becomes `existing ++ append.scenes`. Returns the
    /// updated row, or `None` if `owner` has no session with this id.
    fn append_scenes(
        &mut self,
        id: GameSessionId,
        owner: UserId,
        append: SceneAppend,
    ) -> impl Future<Output = Result<Option<GameSession>, StoreError>> + Send;

    /// Range scan over the sessions owned by `owner`, ordered by id.
    fn game_sessions(
        &mut self,
        owner: UserId,
    ) -> impl Future<Output = Result<Vec<GameSession>, StoreError>> + Send;

    // -- Starting stories --

    /// Point lookup by primary key.
    fn starting_story(
        &mut self,
        id: StoryId,
    ) -> impl Future<Output = Result<Option<StartingStory>, StoreError>> + Send;

    // -- Boundary --

    /// Makes every write of this transaction durable and visible.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Discards every write. Equivalent to dropping the transaction.
    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized,
    {
        async move {
            drop(self);
            Ok(())
        }
    }
}
