mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use helpdesk_api::admin::{NewAccount, create_account};
use helpdesk_api::middleware::SessionKeys;
use helpdesk_api::{AppStateInner, Settings, router};
use helpdesk_db::Database;
use helpdesk_types::Role;
use helpdesk_ui::RefreshPolicy;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpdesk=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    bootstrap_admin(&db, &config)?;

    let settings = Settings {
        enforce_closed_chat: config.enforce_closed_chat,
        refresh: RefreshPolicy::from_secs(config.refresh_secs),
    };
    let state = Arc::new(AppStateInner {
        db,
        keys: SessionKeys::new(&config.jwt_secret, config.session_ttl),
        settings,
    });

    let app = router(state).layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Helpdesk listening on {}", addr);
    if config.enforce_closed_chat {
        info!("Chat on closed tickets is rejected");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Creates the configured admin on an empty install. An existing admin wins.
fn bootstrap_admin(db: &Database, config: &Config) -> anyhow::Result<()> {
    if db.has_user_with_role(Role::Admin)? {
        return Ok(());
    }
    let Some((login, password)) = &config.bootstrap_admin else {
        warn!("No admin account exists; set HELPDESK_ADMIN_LOGIN and HELPDESK_ADMIN_PASSWORD");
        return Ok(());
    };

    create_account(
        db,
        NewAccount { login, password, nickname: None, role: Role::Admin },
    )
    .map_err(|e| anyhow::anyhow!("Could not create bootstrap admin '{}': {}", login, e))?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
