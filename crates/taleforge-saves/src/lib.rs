//! Saved-playthrough persistence for Taleforge.
//!
//! A game session is created on the first save and grows on every later
//! save by appending the new scenes to the stored ones. Appends happen in
//! the store as one operation, so two saves racing on the same session
//! both land.
//!
//! # Key types
//!
//! - [`SaveManager`] — save, load, and look up starting content
//! - [`SaveError`] — what can go wrong, mapped onto the shared taxonomy

mod error;
mod manager;

pub use error::SaveError;
pub use manager::SaveManager;
