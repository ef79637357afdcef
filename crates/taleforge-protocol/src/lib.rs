//! Shared vocabulary for the Taleforge core.
//!
//! This crate defines the "language" that the identity layer, the save
//! layer, and the store speak to each other:
//!
//! - **Identifiers** ([`UserId`], [`GameSessionId`], [`StoryId`]) —
//!   newtypes so a story id can never be passed where a user id belongs.
//! - **Records** ([`User`], [`EmailToken`], [`AccessToken`],
//!   [`GameSession`], [`StartingStory`]) — the rows the store persists.
//! - **Requests and views** ([`SaveRequest`], [`SessionSummary`],
//!   [`UserProfile`], [`ProfileUpdate`], [`StoryView`]) — what callers
//!   hand in and get back.
//! - **Validation** ([`Email`]) — a syntactically checked address.
//! - **Errors** ([`ProtocolError`], [`ErrorKind`]) — the stable failure
//!   taxonomy every layer maps onto.
//! - **Time** ([`Clock`]) — an injectable source of "now".
//!
//! # Architecture
//!
//! The protocol layer sits underneath everything else. It doesn't know
//! about transactions or password hashing. It only knows what the data
//! looks like.
//!
//! ```text
//! Identity / Saves (operations) → Store (persistence) → Protocol (data)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod clock;
mod email;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use clock::{Clock, ManualClock, SystemClock};
pub use email::Email;
pub use error::{ErrorKind, ProtocolError};
pub use types::{
    AccessToken, EmailToken, GameSession, GameSessionId, Inventory,
    NewGameSession, ProfileUpdate, SaveRequest, Scene, SceneAppend,
    SessionSummary, StartingStory, StoryId, StoryView, TokenPurpose, User,
    UserChanges, UserId, UserProfile,
};
