//! Huella Core - Report domain, validation, moderation and access rules.
//!
//! This crate holds the logic of the Huella incident-reporting platform that
//! does not touch the database or the network:
//!
//! - [`report`]: domain enums, locations and reporter contact data
//! - [`validation`]: submission and photo batch rules
//! - [`moderation`]: the report state machine and queue filters
//! - [`pagination`]: page resolution for listings
//! - [`stats`]: dashboard shapes and folding helpers
//! - [`access`]: roles and the [`access::Authorizer`] seam
//! - [`auth`]: password hashing, session tokens and registration rules

pub mod access;
pub mod auth;
pub mod moderation;
pub mod pagination;
pub mod report;
pub mod stats;
pub mod validation;

pub use access::{AccessError, Authorizer, Principal, Requirement, Role, RoleAuthorizer};
pub use moderation::{ModerationError, QueueFilter, Transition};
pub use report::{
    AnimalType, Location, LogAction, PhotoState, ReportState, Reporter, Sector, Severity,
};
pub use validation::{ValidReport, ValidationErrors};
