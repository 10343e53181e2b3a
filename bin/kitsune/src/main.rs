//! # Kitsune forums
//!
//! Assembles the service from the compiled-in plugins and serves the API.

#[cfg(not(feature = "db-sqlite"))]
compile_error!("kitsune needs a storage backend; enable the `db-sqlite` feature");

use anyhow::Context;
use ks_api::AppState;
use ks_config::{LogSettings, Settings};
use ks_notify_queue::{LogMailer, NotificationQueue, Notifier, NotifierSettings};
use ks_services::ForumService;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(feature = "db-sqlite")]
use ks_db_sqlite::SqliteForumRepo;

/// `RUST_LOG` wins over the configured filter.
fn install_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    install_tracing(&settings.log);

    // 1. Storage
    #[cfg(feature = "db-sqlite")]
    let repo = Arc::new(
        SqliteForumRepo::connect(
            settings.database.url.expose_secret(),
            settings.database.max_connections,
        )
        .await
        .context("opening the database")?,
    );

    // 2. Notifications
    let notifier = Notifier::new(
        repo.clone(),
        repo.clone(),
        repo.clone(),
        repo.clone(),
        Arc::new(LogMailer),
        NotifierSettings {
            site_url: settings.notifications.site_url.clone(),
            from_address: settings.notifications.from_address.clone(),
        },
    );
    let (queue, worker) = NotificationQueue::start(notifier);

    // 3. Service and routes
    let service = ForumService::new(
        repo.clone(),
        repo.clone(),
        repo.clone(),
        repo,
        Arc::new(queue),
    );
    let app = ks_api::app(AppState {
        service: Arc::new(service),
    });

    let address = settings.server.address();
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "kitsune listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    // The router owned the last queue handle; let the worker drain.
    worker.await.context("notification worker panicked")?;
    Ok(())
}
