//! Huella Server - HTTP API server.
//!
//! This crate provides the JSON API of the Huella incident-reporting platform.
//!
//! ## Endpoints
//!
//! Public:
//! - `GET /api/health`, `GET /api/summary`, `GET /api/stats`, `GET /api/map`
//! - `POST /api/reports` - Multipart report submission
//! - `GET /api/reports/{id}` - Approved report detail
//!
//! Moderators:
//! - `GET /api/moderation/queue` - Filtered, paginated queue
//! - `POST /api/moderation/reports/{id}/{approve,reject,comment}`
//! - `GET /api/moderation/reports/{id}` and `.../log`
//! - `PATCH /api/moderation/photos/{id}`
//! - `GET /api/moderation/export.csv`
//! - `GET /api/users`, `GET /api/users/{id}`
//!
//! Admins:
//! - `POST /api/moderation/{reset,approve,reject}` - Bulk actions on `ids`
//! - `DELETE /api/reports/{id}`
//! - `POST /api/users`, `PUT /api/users/{id}`, `DELETE /api/users/{id}`
//!
//! Superusers:
//! - `DELETE /api/moderation/log/{id}`
//!
//! Accounts:
//! - `POST /api/auth/{register,login,logout}`
//! - `GET /api/auth/check-email`, `GET /api/auth/me`
//!
//! ## Example
//!
//! ```no_run
//! use huella_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
pub mod extractors;
mod handlers;
pub mod image_host;
pub mod models;
pub mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use huella_core::auth::SESSION_LIFETIME_HOURS;
use huella_storage::Database;

pub use error::{ApiError, Result};
pub use image_host::{ImageHost, LocalImageHost, StoredImage};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// URL prefix under which uploaded photos are served.
pub const DEFAULT_MEDIA_PREFIX: &str = "/media";

/// Upper bound for a multipart submission body.
///
/// Larger than the photo limits so oversized photos get a field error
/// instead of a bare 413.
pub const MAX_SUBMISSION_BYTES: usize = 64 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 8000).
    pub port: u16,
    /// Database path (None = in-memory).
    pub db_path: Option<PathBuf>,
    /// Directory where uploaded photos are written.
    pub media_dir: PathBuf,
    /// Public URL prefix for photos.
    pub media_prefix: String,
    /// Session lifetime in hours.
    pub session_hours: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: None,
            media_dir: PathBuf::from("media"),
            media_prefix: DEFAULT_MEDIA_PREFIX.to_string(),
            session_hours: SESSION_LIFETIME_HOURS,
        }
    }
}

impl ServerConfig {
    /// Creates a config for in-memory testing.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a config with a specific database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the media directory.
    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }

    /// Sets the session lifetime.
    pub fn with_session_hours(mut self, hours: i64) -> Self {
        self.session_hours = hours;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] huella_storage::StorageError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// Routes of the JSON API, without static files or middleware.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::public::health))
        .route("/api/summary", get(handlers::public::summary))
        .route("/api/stats", get(handlers::public::stats))
        .route("/api/map", get(handlers::public::map))
        .route(
            "/api/reports",
            post(handlers::reports::submit).layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES)),
        )
        .route(
            "/api/reports/{id}",
            get(handlers::public::report_detail).delete(handlers::reports::delete),
        )
        .route("/api/moderation/queue", get(handlers::moderation::queue))
        .route(
            "/api/moderation/reports/{id}",
            get(handlers::moderation::detail),
        )
        .route(
            "/api/moderation/reports/{id}/approve",
            post(handlers::moderation::approve),
        )
        .route(
            "/api/moderation/reports/{id}/reject",
            post(handlers::moderation::reject),
        )
        .route(
            "/api/moderation/reports/{id}/comment",
            post(handlers::moderation::comment),
        )
        .route(
            "/api/moderation/reports/{id}/log",
            get(handlers::moderation::log),
        )
        .route(
            "/api/moderation/log/{id}",
            delete(handlers::moderation::delete_log_entry),
        )
        .route("/api/moderation/reset", post(handlers::moderation::reset))
        .route(
            "/api/moderation/approve",
            post(handlers::moderation::bulk_approve),
        )
        .route(
            "/api/moderation/reject",
            post(handlers::moderation::bulk_reject),
        )
        .route(
            "/api/moderation/photos/{id}",
            patch(handlers::moderation::update_photo),
        )
        .route(
            "/api/moderation/export.csv",
            get(handlers::moderation::export_csv),
        )
        .route(
            "/api/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route(
            "/api/users/{id}",
            get(handlers::users::get)
                .put(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/check-email", get(handlers::auth::check_email))
        .route("/api/auth/me", get(handlers::auth::me))
        .with_state(state)
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let db = if let Some(ref path) = config.db_path {
            Database::with_path(path)?
        } else {
            Database::in_memory()?
        };

        Self::with_database(config, db)
    }

    /// Creates a server with an existing database.
    pub fn with_database(
        config: ServerConfig,
        db: Database,
    ) -> std::result::Result<Self, ServerError> {
        let images = LocalImageHost::new(&config.media_dir, &config.media_prefix);
        let state = AppState::new(db, images)
            .with_session_lifetime(chrono::Duration::hours(config.session_hours));
        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = api_router(state)
            .nest_service(&config.media_prefix, ServeDir::new(&config.media_dir))
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self { router, addr })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until Ctrl+C.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Huella API server on {}", self.addr);

        let domain = if self.addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        // SO_REUSEADDR so a restart does not trip over TIME_WAIT sockets
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
