//! SQLite backend for the marketplace engine.
//!
//! [`SqliteDatabase`] implements every storage trait in [`crate::traits`]. [`shared_database`] hands out a single
//! process-wide instance, connected on first use.
mod shared;
mod sqlite_impl;

pub mod db;
pub use shared::shared_database;
pub use sqlite_impl::SqliteDatabase;
