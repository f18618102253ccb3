//! dropfour engine library.
//!
//! Server-side code for the two-player connect-four service.
//!
//! ## Structure
//!
//! - `stores/` - In-memory authoritative game session state
//! - `use_cases/` - Matchmaking, the bot opponent, game recording
//! - `infrastructure/` - Configuration, clock, persistence (ports + adapters)
//! - `api/` - HTTP and WebSocket entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod stores;
pub mod use_cases;

pub use app::App;
