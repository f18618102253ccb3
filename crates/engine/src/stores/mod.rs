//! In-memory state storage modules.
//!
//! Stores manage runtime state that doesn't belong in the database:
//! - `GameSessionStore` - Active game sessions

pub mod game_sessions;

pub use game_sessions::GameSessionStore;
