//! Core records and request types.
//!
//! Records are the rows the store persists; requests and views are what
//! callers of the core hand in and get back. Everything here derives
//! `Serialize`/`Deserialize` so a routing layer can put it on the wire
//! without wrapper types.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Email;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a registered user.
///
/// Newtype over a v4 UUID. `#[serde(transparent)]` serializes it as the
/// bare UUID string rather than `{ "0": "..." }`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// A fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A saved playthrough's identifier. Assigned by the store on insert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameSessionId(pub u64);

impl fmt::Display for GameSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// A starting story's identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StoryId(pub u64);

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "story-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Opaque game payloads
// ---------------------------------------------------------------------------

/// One unit of narrative appended to a session's history.
///
/// The core never looks inside a scene; it only preserves order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scene(pub serde_json::Value);

/// The protagonist's inventory, stored and returned verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory(pub serde_json::Value);

impl Default for Inventory {
    fn default() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    /// Never written out when a row is serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `None` only for rows imported without a registration timestamp.
    pub created_at: Option<DateTime<Utc>>,
}

/// What an [`EmailToken`] authorizes when its link is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Confirming this token creates the account.
    Registration,
    /// Confirming this token sets a new password.
    PasswordReset,
}

/// A pending registration or password reset, keyed by its link token.
///
/// Keyed by email rather than by user: during registration the user
/// doesn't exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailToken {
    pub token: String,
    pub email: Email,
    /// The hash to give the new account. `None` for reset tokens.
    pub password_hash: Option<String>,
    pub purpose: TokenPurpose,
    pub created_at: DateTime<Utc>,
}

impl EmailToken {
    /// Returns `true` once more than `ttl` has passed since issue.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.created_at > ttl
    }
}

/// An opaque bearer credential for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Returns `true` from `expires_at` onwards.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A saved playthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: GameSessionId,
    pub user_id: UserId,
    pub protagonist_name: String,
    pub session_name: String,
    pub inventory: Inventory,
    /// Append-only: saves extend this, never replace it.
    pub scenes: Vec<Scene>,
    pub last_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A game session before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGameSession {
    pub user_id: UserId,
    pub protagonist_name: String,
    pub session_name: String,
    pub inventory: Inventory,
    pub scenes: Vec<Scene>,
    pub last_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// The changes a save applies to an existing session.
///
/// `scenes` are appended; every other field replaces the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAppend {
    pub session_name: String,
    pub inventory: Inventory,
    pub scenes: Vec<Scene>,
    pub last_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A seed story a new playthrough starts from. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartingStory {
    pub id: StoryId,
    pub story: Option<String>,
    pub image: Option<String>,
}

/// A sparse update to a [`User`] row. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub email: Option<Email>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    /// Changes that only flip the active flag.
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }

    /// Changes that only replace the password hash.
    pub fn password(hash: String) -> Self {
        Self {
            password_hash: Some(hash),
            ..Self::default()
        }
    }

    /// Applies the present fields to `user`.
    pub fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(first) = self.first_name {
            user.first_name = Some(first);
        }
        if let Some(last) = self.last_name {
            user.last_name = Some(last);
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A save submitted by the client.
///
/// Without `id` a new session is created; with `id` the scenes are
/// appended to that session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub id: Option<GameSessionId>,
    pub protagonist_name: String,
    pub session_name: String,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub image: Option<String>,
}

/// A sparse profile edit. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub email: Option<String>,
    /// Plaintext; hashed before it reaches the store.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One saved session as returned by a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: GameSessionId,
    pub protagonist_name: String,
    pub inventory: Inventory,
    pub session_name: String,
    pub scenes: Vec<Scene>,
    pub image: Option<String>,
    pub last_played: DateTime<Utc>,
}

impl From<GameSession> for SessionSummary {
    fn from(session: GameSession) -> Self {
        Self {
            id: session.id,
            protagonist_name: session.protagonist_name,
            inventory: session.inventory,
            session_name: session.session_name,
            scenes: session.scenes,
            image: session.last_image,
            last_played: session.updated_at,
        }
    }
}

/// A starting story that has both its text and its image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryView {
    pub id: StoryId,
    pub story: String,
    pub image: String,
}

/// The public face of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    /// Empty string when unset.
    pub first_name: String,
    /// Empty string when unset.
    pub last_name: String,
    /// `YYYY-MM-DD`, or `None` when the row has no timestamp.
    pub registered_at: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_string(),
            first_name: user.first_name.clone().unwrap_or_default(),
            last_name: user.last_name.clone().unwrap_or_default(),
            registered_at: user
                .created_at
                .map(|at| at.format("%Y-%m-%d").to_string()),
        }
    }
}
