//! In-process [`Store`] implementation.
//!
//! All tables live behind one async mutex. A transaction takes the lock
//! for its whole lifetime and works on a private copy of the tables;
//! commit swaps the copy in, drop throws it away. Transactions are
//! therefore fully serialized, which also makes every read-modify-write
//! (including [`Transaction::append_scenes`]) atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use taleforge_protocol::{
    AccessToken, Email, EmailToken, GameSession, GameSessionId, NewGameSession,
    SceneAppend, StartingStory, StoryId, User, UserChanges, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::tables::{ACCESS_TOKENS, EMAIL_TOKENS, GAME_SESSIONS, USERS};
use crate::{Store, StoreError, Transaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    email_tokens: HashMap<String, EmailToken>,
    access_tokens: HashMap<String, AccessToken>,
    game_sessions: BTreeMap<GameSessionId, GameSession>,
    stories: BTreeMap<StoryId, StartingStory>,
    last_session_id: u64,
}

impl Tables {
    fn email_taken(&self, email: &Email, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| &u.email == email && Some(u.id) != except)
    }
}

/// An in-memory relational store.
///
/// Cheap to clone: clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a starting story. Stories are content, not user data, so
    /// they are seeded from outside the core.
    pub async fn seed_story(&self, story: StartingStory) {
        let mut tables = self.tables.lock().await;
        tracing::debug!(story_id = %story.id, "starting story seeded");
        tables.stories.insert(story.id, story);
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTransaction { guard, staged })
    }
}

/// A transaction on a [`MemoryStore`].
///
/// Holds the store lock until committed or dropped. Beginning a second
/// transaction on the same store from the task that holds this one waits
/// forever.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl Transaction for MemoryTransaction {
    // -- Users ------------------------------------------------------------

    async fn user_by_id(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(self
            .staged
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn insert_user(&mut self, user: User) -> Result<User, StoreError> {
        if self.staged.users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation {
                table: USERS,
                column: "id",
            });
        }
        if self.staged.email_taken(&user.email, None) {
            return Err(StoreError::UniqueViolation {
                table: USERS,
                column: "email",
            });
        }
        self.staged.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &mut self,
        id: UserId,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        if !self.staged.users.contains_key(&id) {
            return Ok(None);
        }
        if let Some(email) = &changes.email {
            if self.staged.email_taken(email, Some(id)) {
                return Err(StoreError::UniqueViolation {
                    table: USERS,
                    column: "email",
                });
            }
        }
        let Some(user) = self.staged.users.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(user);
        Ok(Some(user.clone()))
    }

    async fn delete_user(&mut self, id: UserId) -> Result<u64, StoreError> {
        if self.staged.users.remove(&id).is_none() {
            return Ok(0);
        }
        // ON DELETE CASCADE
        self.staged.access_tokens.retain(|_, t| t.user_id != id);
        self.staged.game_sessions.retain(|_, s| s.user_id != id);
        Ok(1)
    }

    // -- Email tokens -----------------------------------------------------

    async fn email_token(&mut self, token: &str) -> Result<Option<EmailToken>, StoreError> {
        Ok(self.staged.email_tokens.get(token).cloned())
    }

    async fn insert_email_token(&mut self, token: EmailToken) -> Result<EmailToken, StoreError> {
        if self.staged.email_tokens.contains_key(&token.token) {
            return Err(StoreError::UniqueViolation {
                table: EMAIL_TOKENS,
                column: "token",
            });
        }
        if self
            .staged
            .email_tokens
            .values()
            .any(|t| t.email == token.email)
        {
            return Err(StoreError::UniqueViolation {
                table: EMAIL_TOKENS,
                column: "email",
            });
        }
        self.staged
            .email_tokens
            .insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn replace_email_token(
        &mut self,
        replacement: EmailToken,
    ) -> Result<Option<EmailToken>, StoreError> {
        let Some(current) = self
            .staged
            .email_tokens
            .values()
            .find(|t| t.email == replacement.email)
            .map(|t| t.token.clone())
        else {
            return Ok(None);
        };
        if current != replacement.token
            && self.staged.email_tokens.contains_key(&replacement.token)
        {
            return Err(StoreError::UniqueViolation {
                table: EMAIL_TOKENS,
                column: "token",
            });
        }
        self.staged.email_tokens.remove(&current);
        self.staged
            .email_tokens
            .insert(replacement.token.clone(), replacement.clone());
        Ok(Some(replacement))
    }

    async fn delete_email_tokens(&mut self, email: &Email) -> Result<u64, StoreError> {
        let before = self.staged.email_tokens.len();
        self.staged.email_tokens.retain(|_, t| &t.email != email);
        Ok((before - self.staged.email_tokens.len()) as u64)
    }

    // -- Access tokens ----------------------------------------------------

    async fn access_token(&mut self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.staged.access_tokens.get(token).cloned())
    }

    async fn insert_access_token(
        &mut self,
        token: AccessToken,
    ) -> Result<AccessToken, StoreError> {
        if !self.staged.users.contains_key(&token.user_id) {
            return Err(StoreError::ForeignKeyViolation {
                table: ACCESS_TOKENS,
                column: "user_id",
            });
        }
        if self.staged.access_tokens.contains_key(&token.token) {
            return Err(StoreError::UniqueViolation {
                table: ACCESS_TOKENS,
                column: "token",
            });
        }
        self.staged
            .access_tokens
            .insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn delete_access_token(&mut self, token: &str) -> Result<u64, StoreError> {
        Ok(u64::from(self.staged.access_tokens.remove(token).is_some()))
    }

    async fn delete_access_tokens(&mut self, user: UserId) -> Result<u64, StoreError> {
        let before = self.staged.access_tokens.len();
        self.staged.access_tokens.retain(|_, t| t.user_id != user);
        Ok((before - self.staged.access_tokens.len()) as u64)
    }

    // -- Game sessions ----------------------------------------------------

    async fn insert_game_session(
        &mut self,
        session: NewGameSession,
    ) -> Result<GameSession, StoreError> {
        if !self.staged.users.contains_key(&session.user_id) {
            return Err(StoreError::ForeignKeyViolation {
                table: GAME_SESSIONS,
                column: "user_id",
            });
        }
        self.staged.last_session_id += 1;
        let stored = GameSession {
            id: GameSessionId(self.staged.last_session_id),
            user_id: session.user_id,
            protagonist_name: session.protagonist_name,
            session_name: session.session_name,
            inventory: session.inventory,
            scenes: session.scenes,
            last_image: session.last_image,
            updated_at: session.updated_at,
        };
        self.staged.game_sessions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn append_scenes(
        &mut self,
        id: GameSessionId,
        owner: UserId,
        append: SceneAppend,
    ) -> Result<Option<GameSession>, StoreError> {
        let Some(session) = self
            .staged
            .game_sessions
            .get_mut(&id)
            .filter(|s| s.user_id == owner)
        else {
            return Ok(None);
        };
        session.scenes.extend(append.scenes);
        session.session_name = append.session_name;
        session.inventory = append.inventory;
        session.last_image = append.last_image;
        session.updated_at = append.updated_at;
        Ok(Some(session.clone()))
    }

    async fn game_sessions(&mut self, owner: UserId) -> Result<Vec<GameSession>, StoreError> {
        Ok(self
            .staged
            .game_sessions
            .values()
            .filter(|s| s.user_id == owner)
            .cloned()
            .collect())
    }

    // -- Starting stories -------------------------------------------------

    async fn starting_story(&mut self, id: StoryId) -> Result<Option<StartingStory>, StoreError> {
        Ok(self.staged.stories.get(&id).cloned())
    }

    // -- Boundary ---------------------------------------------------------

    async fn commit(self) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}
