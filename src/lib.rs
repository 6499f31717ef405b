//! Impulse economy backend
//!
//! Virtual-currency ledger for a chat community, with a timed giveaway
//! mechanic on top. Exposes core modules for use by binaries and tests.

pub mod commands;
pub mod config;
pub mod directory;
pub mod error;
pub mod giveaway;
pub mod leaderboard;
pub mod ledger;
pub mod models;
pub mod store;

pub use config::EconomyConfig;
pub use error::EconomyError;
pub use ledger::Ledger;
pub use models::{Rank, UserId};
