//! `Taleforge` builder and facade.
//!
//! This is the entry point for embedding the core. It ties together the
//! layers: store → identity → saves, sharing one store, one clock, and one
//! configuration between them.

use std::marker::PhantomData;
use std::sync::Arc;

use taleforge_identity::{
    Argon2Hasher, CredentialHasher, IdentityManager, RandomTokens, TokenGenerator,
};
use taleforge_protocol::{Clock, SystemClock, UserId};
use taleforge_saves::SaveManager;
use taleforge_store::Store;

use crate::{EmailLink, TaleforgeConfig, TaleforgeError};

/// Builder for configuring a [`Taleforge`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use taleforge::prelude::*;
///
/// let core = Taleforge::builder()
///     .config(TaleforgeConfig::default())
///     .build(Arc::new(MemoryStore::new()));
/// # let _ = core;
/// ```
pub struct TaleforgeBuilder<S: Store> {
    config: TaleforgeConfig,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    store: PhantomData<fn() -> S>,
}

impl<S: Store> TaleforgeBuilder<S> {
    /// Creates a builder with default settings: Argon2 hashing, random
    /// tokens, and the system clock.
    pub fn new() -> Self {
        Self {
            config: TaleforgeConfig::default(),
            hasher: Arc::new(Argon2Hasher::new()),
            tokens: Arc::new(RandomTokens),
            clock: Arc::new(SystemClock),
            store: PhantomData,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: TaleforgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the password hasher.
    pub fn hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Sets the token and user-id generator.
    pub fn tokens(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Sets the clock shared by both managers.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the facade over `store`.
    pub fn build(self, store: Arc<S>) -> Taleforge<S> {
        let identity = IdentityManager::new(Arc::clone(&store), self.config.identity.clone())
            .with_hasher(self.hasher)
            .with_tokens(self.tokens)
            .with_clock(Arc::clone(&self.clock));
        let saves = SaveManager::new(Arc::clone(&store)).with_clock(self.clock);

        tracing::debug!(config = ?self.config, "taleforge core built");
        Taleforge {
            store,
            identity,
            saves,
            config: self.config,
        }
    }
}

impl<S: Store> Default for TaleforgeBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// The identity and save-persistence core.
///
/// Cheap to share behind an `Arc`: every method takes `&self`, and all
/// mutable state lives in the store.
pub struct Taleforge<S: Store> {
    store: Arc<S>,
    identity: IdentityManager<S>,
    saves: SaveManager<S>,
    config: TaleforgeConfig,
}

impl<S: Store> Taleforge<S> {
    /// Creates a new builder.
    pub fn builder() -> TaleforgeBuilder<S> {
        TaleforgeBuilder::new()
    }

    /// Registration, login, tokens, and account edits.
    pub fn identity(&self) -> &IdentityManager<S> {
        &self.identity
    }

    /// Saved playthroughs, starting stories, and profiles.
    pub fn saves(&self) -> &SaveManager<S> {
        &self.saves
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The configuration this core was built with.
    pub fn config(&self) -> &TaleforgeConfig {
        &self.config
    }

    /// Resolves a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<UserId, TaleforgeError> {
        Ok(self.identity.validate_token(token).await?)
    }

    /// Sets a new password from a reset link and signs the user in,
    /// returning a fresh access token.
    pub async fn complete_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<String, TaleforgeError> {
        let email = self
            .identity
            .confirm_password_reset(token, new_password)
            .await?;
        Ok(self.identity.login(email.as_str(), new_password).await?)
    }

    /// The activation email for a registration token.
    pub fn activation_link(&self, base_url: &str, token: &str) -> EmailLink {
        EmailLink::activation(base_url, token, self.config.identity.email_token_ttl)
    }

    /// The reset email for a password-reset token.
    pub fn reset_link(&self, base_url: &str, token: &str) -> EmailLink {
        EmailLink::reset(base_url, token, self.config.identity.email_token_ttl)
    }
}
