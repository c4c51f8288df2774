//! API route handlers.

pub mod auth;
pub mod moderation;
pub mod public;
pub mod reports;
pub mod users;
