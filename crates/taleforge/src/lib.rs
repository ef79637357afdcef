//! # Taleforge
//!
//! Identity and save-persistence core for narrative game backends.
//!
//! Taleforge handles who a player is (registration by email link, login,
//! access tokens, password resets) and what they've played (saved
//! sessions whose scenes only ever grow). A routing layer sits on top and
//! maps every [`Failure`] onto its own status codes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taleforge::prelude::*;
//!
//! # async fn run() -> Result<(), TaleforgeError> {
//! let config = TaleforgeConfig::from_env()?;
//! taleforge::telemetry::init(&config.log_filter);
//!
//! let core = Taleforge::builder()
//!     .config(config)
//!     .build(Arc::new(MemoryStore::new()));
//!
//! let link = core.identity().request_registration("ayla@example.com", "pw").await?;
//! let token = core.identity().confirm_registration(&link).await?;
//! let user = core.authenticate(&token).await?;
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod facade;
mod links;
pub mod telemetry;

pub use config::{
    ConfigError, ENV_ACCESS_TOKEN_TTL_MINS, ENV_EMAIL_TOKEN_TTL_MINS, ENV_LOG, TaleforgeConfig,
};
pub use facade::{Taleforge, TaleforgeBuilder};
pub use error::{Failure, TaleforgeError};
pub use links::EmailLink;

pub use taleforge_identity as identity;
pub use taleforge_protocol as protocol;
pub use taleforge_saves as saves;
pub use taleforge_store as store;

pub mod prelude {
    pub use crate::{EmailLink, Failure, Taleforge, TaleforgeConfig, TaleforgeError};
    pub use taleforge_identity::{
        Argon2Hasher, CredentialHasher, IdentityConfig, IdentityError, IdentityManager,
        RandomTokens, TokenGenerator,
    };
    pub use taleforge_protocol::{
        Clock, Email, ErrorKind, GameSessionId, Inventory, ManualClock, ProfileUpdate,
        SaveRequest, Scene, SessionSummary, StartingStory, StoryId, StoryView, SystemClock,
        UserId, UserProfile,
    };
    pub use taleforge_saves::{SaveError, SaveManager};
    pub use taleforge_store::{MemoryStore, Store, StoreError, Transaction};
}
