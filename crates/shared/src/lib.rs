//! dropfour Protocol - Shared wire types for the server and browser clients
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde
//! 2. **No business logic** - Pure data types and serialization
//! 3. **No domain types** - boards travel as `Vec<Vec<u8>>`, ids as strings

pub mod messages;

pub use messages::{ClientMessage, GameResult, ServerMessage};
