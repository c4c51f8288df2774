//! Application state for the API server.

use std::sync::Arc;

use chrono::Duration;
use huella_core::access::{Authorizer, RoleAuthorizer};
use huella_core::auth::SESSION_LIFETIME_HOURS;
use huella_storage::Database;

use crate::image_host::ImageHost;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Arc<Database>,
    /// Role checks used by the guard extractors.
    pub authorizer: Arc<dyn Authorizer>,
    /// Where uploaded photos go.
    pub images: Arc<dyn ImageHost>,
    /// How long a new session stays valid.
    pub session_lifetime: Duration,
}

impl AppState {
    /// Creates application state with the default authorizer.
    pub fn new(db: Database, images: impl ImageHost + 'static) -> Self {
        Self::with_components(db, RoleAuthorizer, images)
    }

    /// Creates application state with custom components.
    pub fn with_components(
        db: Database,
        authorizer: impl Authorizer + 'static,
        images: impl ImageHost + 'static,
    ) -> Self {
        Self {
            db: Arc::new(db),
            authorizer: Arc::new(authorizer),
            images: Arc::new(images),
            session_lifetime: Duration::hours(SESSION_LIFETIME_HOURS),
        }
    }

    /// Sets the session lifetime.
    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }
}
