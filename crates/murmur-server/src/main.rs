mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use murmur_api::notify::{Mailer, SmtpMailer};
use murmur_api::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,murmur_api=debug,murmur_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let mailer = match (&config.mail, config.dev) {
        (_, true) => {
            info!("ENV=DEV, email notifications disabled");
            Mailer::Disabled
        }
        (Some(mail), false) => Mailer::Smtp(SmtpMailer::new(&mail.service, &mail.user, &mail.pass)?),
        (None, false) => {
            warn!("MAIL_SERVICE/MAIL_USER/MAIL_PASS not set, email notifications disabled");
            Mailer::Disabled
        }
    };

    let db = murmur_db::Database::open(&config.db_path)?;

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        master_salt: config.master_salt.clone(),
        admin_token: config.admin_token.clone(),
        inbox_owner: config.target_mail.clone(),
        mailer,
    });

    let app = murmur_api::router(app_state.clone(), config.limits);

    let addr = SocketAddr::from((config.host, config.port));
    info!("Murmur listening on {}", addr);
    info!("Rate limits: {}", config.window_summary());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Notification tasks may still hold a reference; the OS reclaims the
    // connection in that case.
    match Arc::try_unwrap(app_state) {
        Ok(state) => state.close()?,
        Err(_) => warn!("State still shared at shutdown, skipping explicit DB close"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
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
