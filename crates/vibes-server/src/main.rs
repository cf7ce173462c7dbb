mod daily;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use vibes_api::auth::{self, AppState, AppStateInner};
use vibes_api::middleware::require_auth;
use vibes_api::{challenges, friends, notifications, photos, profile};
use vibes_notify::Notifier;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vibes=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("VIBES_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: VIBES_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path = std::env::var("VIBES_DB_PATH").unwrap_or_else(|_| "vibes.db".into());
    let host = std::env::var("VIBES_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("VIBES_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let admins: HashSet<String> = std::env::var("VIBES_ADMINS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let daily_hour: u32 = std::env::var("VIBES_DAILY_HOUR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let device_ttl_hours: i64 = std::env::var("VIBES_DEVICE_TTL_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(720); // 30 days

    // Init database
    let db = Arc::new(vibes_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let notifier = Notifier::new(db.clone())?;
    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        notifier: notifier.clone(),
        jwt_secret,
        admins,
        device_ttl: chrono::Duration::hours(device_ttl_hours),
    });

    // Daily challenge announcement job
    tokio::spawn(daily::run_daily_loop(db, notifier, daily_hour));

    // Routes
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/profile", get(profile::get_profile))
        .route("/api/profile/image", post(profile::update_image))
        .route("/api/profile/email", post(profile::update_email))
        .route("/api/profile/password", post(profile::update_password))
        .route("/api/profile/visibility", post(profile::update_visibility))
        .route("/api/challenge/today", get(challenges::today))
        .route("/api/challenge", post(challenges::add_challenge))
        .route("/api/challenge/override", post(challenges::set_override))
        .route("/api/photos/upload", post(photos::upload))
        .route("/api/photos/today", get(photos::today_feed))
        .route("/api/photos/me/today", get(photos::my_today))
        .route("/api/photos/memories", get(photos::my_memories))
        .route("/api/photos/memories/{username}", get(photos::memory_calendar))
        .route("/api/photos/memories/{username}/{date}", get(photos::memories_for_date))
        .route("/api/photos/{id}/like", post(photos::like))
        .route("/api/photos/{id}/comment", post(photos::comment))
        .route("/api/photos/{id}", delete(photos::delete))
        .route("/api/friends", get(friends::list))
        .route("/api/friends/requests", get(friends::requests))
        .route("/api/friends/add", post(friends::add))
        .route("/api/friends/accept", post(friends::accept))
        .route("/api/friends/remove", post(friends::remove))
        .route("/api/notifications", get(notifications::inbox).delete(notifications::clear))
        .route("/api/notifications/register", post(notifications::register_device))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // base64 image payloads
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Vibes server listening on {}", addr);
    info!("Daily challenge announcement at {:02}:00 local time", daily_hour);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
