mod cleanup;
mod config;
mod seed;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use localnews_api::auth::{AppState, AppStateInner};
use localnews_api::notify::LogNotifier;
use localnews_api::otp::OtpMode;
use localnews_api::routes;
use localnews_api::token::TokenService;
use localnews_db::Database;

use crate::config::Config;

const SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "localnews=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {}", e);
            error!("Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    if config.otp_mode == OtpMode::FormatOnly {
        warn!("=================================================================");
        warn!("OTP mode is format-only: ANY six-digit code logs a user in.");
        warn!("Never run this mode outside development.");
        warn!("=================================================================");
    }

    let db = Database::open(&config.db_path)?;
    seed::run(&db, &config.admin_username, config.admin_password.as_deref())?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(&config.jwt_secret, config.token_ttl),
        notifier: Arc::new(LogNotifier),
        otp_mode: config.otp_mode,
        session_ttl: config.session_ttl,
    });

    tokio::spawn(cleanup::run_session_cleanup(
        state.clone(),
        SESSION_CLEANUP_INTERVAL_SECS,
    ));

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Local news server listening on {}", config.addr);
    info!(
        "Token lifetime {}h, admin session lifetime {}h",
        config.token_ttl.num_hours(),
        config.session_ttl.num_hours()
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
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
