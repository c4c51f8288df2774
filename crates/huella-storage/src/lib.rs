//! Huella Storage - SQLite persistence layer.
//!
//! This crate stores everything the reporting backend needs:
//!
//! - Incident reports, their photos and the moderation audit trail
//! - Accounts with their role profile
//! - Bearer-token sessions
//! - Grouped counts for the statistics dashboard
//!
//! # Example
//!
//! ```no_run
//! use huella_core::moderation::{apply, Transition};
//! use huella_storage::Database;
//!
//! let db = Database::in_memory().unwrap();
//!
//! // Approve report 1 on behalf of moderator 7
//! let effect = apply(&Transition::Approve).unwrap();
//! db.moderate_report(1, Some(7), &effect).unwrap();
//! ```

mod database;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{
    Account, AccountActivity, AccountUpdate, LogEntry, MapPin, NewAccount, NewPhoto, Photo,
    PhotoUpdate, QueuePage, Report, RoleCounts, SessionRecord, StateCounts, Summary,
};
pub use pool::ConnectionPool;
pub use repository::{DATE_FORMAT, TIME_FORMAT};
