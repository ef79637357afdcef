//! The identity manager: every credential-changing operation of the core.
//!
//! Each public method here is one request's worth of work. It opens a
//! transaction, reads and writes through it, and commits exactly once. Any
//! early return drops the transaction, which rolls it back.
//!
//! Password hashing and verification run on tokio's blocking pool and
//! never while a transaction is open. `login` therefore reads the user in
//! one transaction and issues the token in a second, after checking that
//! the stored hash it verified against is still current.
//!
//! Inserts keyed by generated tokens or ids go through [`with_retry`]:
//! a unique violation on the generated column rolls the attempt back and
//! runs the whole attempt again in a fresh transaction.
//!
//! # Concurrency note
//!
//! `IdentityManager` holds no mutable state of its own. It is shared by
//! reference between request tasks; all coordination happens inside the
//! store's transactions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use taleforge_protocol::{
    AccessToken, Clock, Email, EmailToken, ProfileUpdate, SystemClock, TokenPurpose, User,
    UserChanges, UserId, UserProfile,
};
use taleforge_store::{Store, StoreError, Transaction, tables};

use crate::{
    Argon2Hasher, CredentialHasher, IdentityConfig, IdentityError, RandomTokens, RetryPolicy,
    TokenGenerator, with_retry,
};

/// Runs registration, authentication, account edits, and password resets
/// against a [`Store`].
///
/// ## Token lifecycle
///
/// ```text
/// request_registration() ──→ [EmailToken] ──confirm_registration()──→ [User] + [AccessToken]
///                                 │
///                                 └──(older than TTL)──→ Expired, purged
///
/// login() ──→ [AccessToken] ──validate_token()──→ UserId
///                  │
///                  ├──logout() / deactivate() / delete_user()──→ revoked
///                  └──(past expires_at)──→ purged on next validation
///
/// request_password_reset() ──→ [EmailToken] ──confirm_password_reset()──→ rotated
/// ```
pub struct IdentityManager<S: Store> {
    store: Arc<S>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    config: IdentityConfig,
}

impl<S: Store> IdentityManager<S> {
    /// Creates a manager with Argon2 hashing, random tokens, and the
    /// system clock.
    pub fn new(store: Arc<S>, config: IdentityConfig) -> Self {
        Self {
            store,
            hasher: Arc::new(Argon2Hasher::new()),
            tokens: Arc::new(RandomTokens),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the password hasher.
    pub fn with_hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Replaces the token and user-id generator.
    pub fn with_tokens(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Starts a registration: stores a pending registration token holding
    /// the hashed password and returns the token for the activation link.
    ///
    /// A second request for the same email replaces the earlier link.
    ///
    /// # Errors
    /// - [`IdentityError::InvalidInput`] if `email` is malformed.
    /// - [`IdentityError::AlreadyExists`] if a user already has `email`.
    pub async fn request_registration(
        &self,
        email: &str,
        password: &str,
    ) -> Result<String, IdentityError> {
        let email = Email::parse(email)?;
        let password_hash = self.hash(password).await?;

        let token = with_retry(
            self.config.email_token_retry,
            |e: &IdentityError| collided_on(e, tables::EMAIL_TOKENS, "token"),
            |_| self.registration_attempt(&email, &password_hash),
        )
        .await
        .map_err(exhausted(self.config.email_token_retry))?;

        tracing::info!(email = %email.masked(), token = prefix(&token), "registration requested");
        Ok(token)
    }

    async fn registration_attempt(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<String, IdentityError> {
        let mut tx = self.store.begin().await?;

        if tx.user_by_email(email).await?.is_some() {
            return Err(IdentityError::AlreadyExists);
        }

        let superseded = tx.delete_email_tokens(email).await?;
        if superseded > 0 {
            tracing::debug!(email = %email.masked(), superseded, "cleared earlier email tokens");
        }

        let pending = tx
            .insert_email_token(EmailToken {
                token: self.tokens.token(),
                email: email.clone(),
                password_hash: Some(password_hash.to_owned()),
                purpose: TokenPurpose::Registration,
                created_at: self.clock.now(),
            })
            .await?;

        tx.commit().await?;
        Ok(pending.token)
    }

    /// Confirms a registration link: creates the user, consumes the link,
    /// and returns the user's first access token.
    ///
    /// # Errors
    /// - [`IdentityError::NotFound`] if no registration token matches.
    /// - [`IdentityError::Expired`] if the link is older than the TTL; the
    ///   email's tokens are purged in that case.
    /// - [`IdentityError::AlreadyExists`] if the email was registered
    ///   meanwhile.
    pub async fn confirm_registration(&self, token: &str) -> Result<String, IdentityError> {
        let access = with_retry(
            self.config.user_id_retry,
            |e: &IdentityError| {
                collided_on(e, tables::USERS, "id") || collided_on(e, tables::ACCESS_TOKENS, "token")
            },
            |_| self.confirmation_attempt(token),
        )
        .await
        .map_err(exhausted(self.config.user_id_retry))?;

        Ok(access.token)
    }

    async fn confirmation_attempt(&self, token: &str) -> Result<AccessToken, IdentityError> {
        let tx = self.store.begin().await?;
        let (mut tx, pending) = self
            .live_email_token(tx, token, TokenPurpose::Registration)
            .await?;

        if tx.user_by_email(&pending.email).await?.is_some() {
            return Err(IdentityError::AlreadyExists);
        }

        let Some(password_hash) = pending.password_hash else {
            tracing::warn!(token = prefix(token), "registration token carries no password");
            return Err(IdentityError::NotFound("token"));
        };

        let user = tx
            .insert_user(User {
                id: self.tokens.user_id(),
                email: pending.email,
                password_hash,
                is_active: true,
                first_name: None,
                last_name: None,
                created_at: Some(self.clock.now()),
            })
            .await?;

        tx.delete_email_tokens(&user.email).await?;
        let access = self.issue_access_token(&mut tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, email = %user.email.masked(), "registration confirmed");
        Ok(access)
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Checks a password and issues a fresh access token, revoking any
    /// token the user held before.
    ///
    /// A deactivated user who logs in successfully is reactivated.
    ///
    /// # Errors
    /// - [`IdentityError::InvalidInput`] if `email` is malformed.
    /// - [`IdentityError::NotFound`] if no user has `email`.
    /// - [`IdentityError::InvalidCredentials`] if the password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        let email = Email::parse(email)?;

        let user = {
            let mut tx = self.store.begin().await?;
            tx.user_by_email(&email)
                .await?
                .ok_or(IdentityError::NotFound("user"))?
        };

        if !self.verify(password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(IdentityError::InvalidCredentials);
        }

        let access = with_retry(
            self.config.access_token_retry,
            |e: &IdentityError| collided_on(e, tables::ACCESS_TOKENS, "token"),
            |_| self.login_attempt(&user),
        )
        .await
        .map_err(exhausted(self.config.access_token_retry))?;

        Ok(access.token)
    }

    async fn login_attempt(&self, verified: &User) -> Result<AccessToken, IdentityError> {
        let mut tx = self.store.begin().await?;

        // The row may have changed while the password was being checked.
        let user = match tx.user_by_id(verified.id).await? {
            Some(user) if user.password_hash == verified.password_hash => user,
            Some(user) => {
                tracing::warn!(user_id = %user.id, "login rejected: password changed during check");
                return Err(IdentityError::InvalidCredentials);
            }
            None => return Err(IdentityError::NotFound("user")),
        };

        if !user.is_active {
            tx.update_user(user.id, UserChanges::active(true)).await?;
            tracing::info!(user_id = %user.id, "inactive user reactivated by login");
        }

        let access = self.issue_access_token(&mut tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(access)
    }

    /// Revokes every access token of `user_id`. Idempotent.
    pub async fn logout(&self, user_id: UserId) -> Result<(), IdentityError> {
        let mut tx = self.store.begin().await?;
        let revoked = tx.delete_access_tokens(user_id).await?;
        tx.commit().await?;

        tracing::info!(%user_id, revoked, "user logged out");
        Ok(())
    }

    /// Resolves an access token to its owner.
    ///
    /// An expired token is deleted as a side effect.
    ///
    /// # Errors
    /// [`IdentityError::InvalidToken`] if the token is unknown or expired.
    pub async fn validate_token(&self, token: &str) -> Result<UserId, IdentityError> {
        let mut tx = self.store.begin().await?;

        let Some(access) = tx.access_token(token).await? else {
            tracing::warn!(token = prefix(token), "unknown access token");
            return Err(IdentityError::InvalidToken);
        };

        if access.is_expired(self.clock.now()) {
            tx.delete_access_token(token).await?;
            tx.commit().await?;
            tracing::info!(user_id = %access.user_id, token = prefix(token), "expired access token purged");
            return Err(IdentityError::InvalidToken);
        }

        Ok(access.user_id)
    }

    // -----------------------------------------------------------------------
    // Account edits
    // -----------------------------------------------------------------------

    /// Applies the present fields of `update` to the user's row and returns
    /// the updated profile. A new password is hashed before storage.
    ///
    /// # Errors
    /// - [`IdentityError::InvalidInput`] if a new email is malformed.
    /// - [`IdentityError::AlreadyExists`] if a new email belongs to
    ///   someone else.
    /// - [`IdentityError::NotFound`] if the user no longer exists.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserProfile, IdentityError> {
        let mut changes = UserChanges {
            first_name: update.first_name,
            last_name: update.last_name,
            ..UserChanges::default()
        };
        if let Some(raw) = update.email {
            changes.email = Some(Email::parse(&raw)?);
        }
        if let Some(password) = update.password {
            changes.password_hash = Some(self.hash(&password).await?);
        }

        let mut tx = self.store.begin().await?;
        match tx.update_user(user_id, changes).await {
            Ok(Some(user)) => {
                tx.commit().await?;
                tracing::info!(%user_id, "profile updated");
                Ok(UserProfile::from(&user))
            }
            Ok(None) => self.orphaned(tx, user_id, "update_profile").await,
            Err(e) if e.is_unique_violation_on(tables::USERS, "email") => {
                Err(IdentityError::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Marks the user active.
    pub async fn activate(&self, user_id: UserId) -> Result<(), IdentityError> {
        let mut tx = self.store.begin().await?;
        if tx.update_user(user_id, UserChanges::active(true)).await?.is_none() {
            return self.orphaned(tx, user_id, "activate").await;
        }
        tx.commit().await?;

        tracing::info!(%user_id, "user activated");
        Ok(())
    }

    /// Marks the user inactive and revokes all of their access tokens.
    pub async fn deactivate(&self, user_id: UserId) -> Result<(), IdentityError> {
        let mut tx = self.store.begin().await?;
        let revoked = tx.delete_access_tokens(user_id).await?;
        if tx.update_user(user_id, UserChanges::active(false)).await?.is_none() {
            return self.orphaned(tx, user_id, "deactivate").await;
        }
        tx.commit().await?;

        tracing::info!(%user_id, revoked, "user deactivated");
        Ok(())
    }

    /// Hard-deletes the user together with their access tokens, game
    /// sessions, and any email tokens issued to their address.
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), IdentityError> {
        let mut tx = self.store.begin().await?;

        let Some(user) = tx.user_by_id(user_id).await? else {
            return self.orphaned(tx, user_id, "delete_user").await;
        };

        let revoked = tx.delete_access_tokens(user_id).await?;
        if tx.delete_user(user_id).await? == 0 {
            return self.orphaned(tx, user_id, "delete_user").await;
        }
        let email_tokens = tx.delete_email_tokens(&user.email).await?;
        tx.commit().await?;

        tracing::info!(%user_id, revoked, email_tokens, "user deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Password reset
    // -----------------------------------------------------------------------

    /// Issues a password-reset link for a registered email and returns its
    /// token. An existing link for the same email is replaced in place.
    ///
    /// # Errors
    /// - [`IdentityError::InvalidInput`] if `email` is malformed.
    /// - [`IdentityError::NotFound`] if no user has `email`.
    pub async fn request_password_reset(&self, email: &str) -> Result<String, IdentityError> {
        let email = Email::parse(email)?;

        let token = with_retry(
            self.config.email_token_retry,
            |e: &IdentityError| collided_on(e, tables::EMAIL_TOKENS, "token"),
            |_| self.reset_request_attempt(&email),
        )
        .await
        .map_err(exhausted(self.config.email_token_retry))?;

        tracing::info!(email = %email.masked(), token = prefix(&token), "password reset requested");
        Ok(token)
    }

    async fn reset_request_attempt(&self, email: &Email) -> Result<String, IdentityError> {
        let mut tx = self.store.begin().await?;

        if tx.user_by_email(email).await?.is_none() {
            return Err(IdentityError::NotFound("user"));
        }

        let fresh = self.reset_token(email.clone(), self.clock.now());
        let token = fresh.token.clone();
        if tx.replace_email_token(fresh.clone()).await?.is_none() {
            tx.insert_email_token(fresh).await?;
        }

        tx.commit().await?;
        Ok(token)
    }

    /// Sets a new password using a reset link, then rotates the link so it
    /// cannot be used again. Returns the account's email.
    ///
    /// # Errors
    /// - [`IdentityError::NotFound`] if no reset token matches or the user
    ///   is gone.
    /// - [`IdentityError::Expired`] if the link is older than the TTL; the
    ///   email's tokens are purged in that case.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<Email, IdentityError> {
        let password_hash = self.hash(new_password).await?;

        let email = with_retry(
            self.config.email_token_retry,
            |e: &IdentityError| collided_on(e, tables::EMAIL_TOKENS, "token"),
            |_| self.reset_confirmation_attempt(token, &password_hash),
        )
        .await
        .map_err(exhausted(self.config.email_token_retry))?;

        tracing::info!(email = %email.masked(), "password reset");
        Ok(email)
    }

    async fn reset_confirmation_attempt(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Email, IdentityError> {
        let tx = self.store.begin().await?;
        let (mut tx, pending) = self
            .live_email_token(tx, token, TokenPurpose::PasswordReset)
            .await?;

        let user = tx
            .user_by_email(&pending.email)
            .await?
            .ok_or(IdentityError::NotFound("user"))?;

        tx.update_user(user.id, UserChanges::password(password_hash.to_owned()))
            .await?
            .ok_or(IdentityError::NotFound("user"))?;

        let rotated = self.reset_token(pending.email.clone(), self.clock.now());
        tx.replace_email_token(rotated).await?;
        tx.commit().await?;

        Ok(pending.email)
    }

    // -----------------------------------------------------------------------
    // Shared steps
    // -----------------------------------------------------------------------

    /// Hashes on the blocking pool. Never called with a transaction open.
    async fn hash(&self, plaintext: &str) -> Result<String, IdentityError> {
        let hasher = Arc::clone(&self.hasher);
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| IdentityError::Hashing(e.to_string()))?
    }

    /// Verifies on the blocking pool. Never called with a transaction open.
    async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, IdentityError> {
        let hasher = Arc::clone(&self.hasher);
        let (plaintext, hash) = (plaintext.to_owned(), hash.to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &hash))
            .await
            .map_err(|e| IdentityError::Hashing(e.to_string()))
    }

    /// Revokes the user's tokens and inserts a fresh one, inside `tx`.
    async fn issue_access_token(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
    ) -> Result<AccessToken, IdentityError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.config.access_token_delta())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let revoked = tx.delete_access_tokens(user_id).await?;
        let access = tx
            .insert_access_token(AccessToken {
                token: self.tokens.token(),
                user_id,
                expires_at,
            })
            .await?;

        tracing::debug!(%user_id, revoked, %expires_at, "access token issued");
        Ok(access)
    }

    /// Looks up an email token and checks its purpose and age.
    ///
    /// Hands the transaction back alongside the token on success. An
    /// expired token purges every token of its email and commits that
    /// purge before reporting [`IdentityError::Expired`].
    async fn live_email_token(
        &self,
        mut tx: S::Tx,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<(S::Tx, EmailToken), IdentityError> {
        let pending = match tx.email_token(token).await? {
            Some(pending) if pending.purpose == purpose => pending,
            _ => {
                tracing::warn!(token = prefix(token), ?purpose, "unknown email token");
                return Err(IdentityError::NotFound("token"));
            }
        };

        if pending.is_expired(self.clock.now(), self.config.email_token_delta()) {
            let purged = tx.delete_email_tokens(&pending.email).await?;
            tx.commit().await?;
            tracing::info!(email = %pending.email.masked(), ?purpose, purged, "expired email token purged");
            return Err(IdentityError::Expired);
        }

        Ok((tx, pending))
    }

    fn reset_token(&self, email: Email, created_at: DateTime<Utc>) -> EmailToken {
        EmailToken {
            token: self.tokens.token(),
            email,
            password_hash: None,
            purpose: TokenPurpose::PasswordReset,
            created_at,
        }
    }

    /// An authenticated user id that has no row. Revokes whatever tokens
    /// still name it, commits that, and reports the user as missing.
    async fn orphaned<T>(
        &self,
        mut tx: S::Tx,
        user_id: UserId,
        operation: &'static str,
    ) -> Result<T, IdentityError> {
        let revoked = tx.delete_access_tokens(user_id).await?;
        tx.commit().await?;

        tracing::error!(
            severity = "critical",
            %user_id,
            operation,
            revoked,
            "token resolved to a user that does not exist"
        );
        Err(IdentityError::NotFound("user"))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn collided_on(err: &IdentityError, table: &str, column: &str) -> bool {
    matches!(err, IdentityError::Store(e) if e.is_unique_violation_on(table, column))
}

/// Converts a collision that survived every attempt into
/// [`IdentityError::RetriesExhausted`]. Other errors pass through.
fn exhausted(policy: RetryPolicy) -> impl FnOnce(IdentityError) -> IdentityError {
    move |err| match err {
        IdentityError::Store(source @ StoreError::UniqueViolation { .. }) => {
            tracing::error!(attempts = policy.max_attempts, error = %source, "identifier collisions exhausted retries");
            IdentityError::RetriesExhausted {
                attempts: policy.max_attempts,
                source,
            }
        }
        other => other,
    }
}

/// The first characters of a token, safe to log.
fn prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
