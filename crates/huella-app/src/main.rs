//! Huella - citizen reporting of animal attacks.
//!
//! This is the main binary:
//! - `serve` runs the HTTP API (the default)
//! - `create-admin` seeds an administrator account

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use directories::ProjectDirs;
use huella_core::access::Role;
use huella_core::auth::{hash_password, validate_password};
use huella_server::{Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use huella_storage::{Database, NewAccount};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Huella - citizen reporting of animal attacks
#[derive(Parser, Debug)]
#[command(name = "huella", version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true, env = "HUELLA_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the HTTP API server
    Serve(ServeArgs),

    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "HUELLA_ADMIN_PASSWORD")]
        password: String,
    },
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
struct ServeArgs {
    /// Address to bind to
    #[arg(long, env = "HUELLA_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(long, env = "HUELLA_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory for uploaded photos
    #[arg(long, env = "HUELLA_MEDIA")]
    media_dir: Option<PathBuf>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            media_dir: None,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "huella", "huella")
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

fn default_media_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("media"))
        .unwrap_or_else(|| PathBuf::from("media"))
}

/// Initialize logging to the console and a daily log file.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("huella={},tower_http=info,warn", log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(7)
                .filename_prefix("huella")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

fn open_database(path: Option<&PathBuf>) -> anyhow::Result<Database> {
    let db = match path {
        Some(path) => Database::with_path(path),
        None => Database::new(),
    }
    .context("failed to open database")?;

    match path {
        Some(path) => tracing::info!("Database opened at {:?}", path),
        None => tracing::info!("Database opened at {:?}", Database::default_db_path()?),
    }
    Ok(db)
}

async fn serve(db: Database, args: ServeArgs) -> anyhow::Result<()> {
    let media_dir = args.media_dir.unwrap_or_else(default_media_dir);
    std::fs::create_dir_all(&media_dir)
        .with_context(|| format!("failed to create media directory {:?}", media_dir))?;

    match db.cleanup_expired_sessions() {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired session(s)", n),
        Err(e) => tracing::warn!("Session cleanup failed: {}", e),
    }

    let config = ServerConfig::default()
        .with_host(args.host)
        .with_port(args.port)
        .with_media_dir(&media_dir);

    tracing::info!("Serving photos from {:?}", media_dir);
    let server = Server::with_database(config, db)?;
    server.run().await?;
    Ok(())
}

fn create_admin(db: &Database, username: &str, email: &str, password: &str) -> anyhow::Result<()> {
    let username = username.trim();
    let email = email.trim().to_lowercase();
    anyhow::ensure!(
        !username.is_empty() && !email.is_empty(),
        "username and email are required"
    );
    validate_password(password)?;

    let account = db.create_account(&NewAccount {
        username: username.to_string(),
        email,
        first_name: String::new(),
        last_name: String::new(),
        password_hash: hash_password(password)?,
        role: Role::Admin,
        is_superuser: true,
        is_staff: true,
    })?;

    tracing::info!(account_id = account.id, "Administrator {} created", account.username);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    tracing::info!("Starting Huella...");
    tracing::debug!("Args: {:?}", args.command);

    let db = open_database(args.db.as_ref())?;

    match args.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(serve_args) => serve(db, serve_args).await?,
        Command::CreateAdmin {
            username,
            email,
            password,
        } => create_admin(&db, &username, &email, &password)?,
    }

    tracing::info!("Huella shutting down");
    Ok(())
}
