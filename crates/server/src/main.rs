use deployflow::api;
use deployflow::config;
use deployflow::db;
use deployflow::schedules::notify::build_mailer;
use deployflow::schedules::{
    MemoryScheduleStore, Notifier, NotifyPolicy, ScheduleManager, ScheduleStore, SchedulesRepo,
};

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod deliveries;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::Config::from_env()?;
    init_tracing(&cfg.log_level);

    let store_kind = if cfg.database_url.is_some() {
        "postgres"
    } else {
        "memory"
    };
    tracing::info!(
        api_addr = %cfg.api_addr,
        store = store_kind,
        smtp = cfg.mail.smtp_host.as_deref().unwrap_or("disabled"),
        migrate_on_startup = cfg.migrate_on_startup,
        notify_on_developers_change = cfg.notify_on_developers_change,
        expose_error_details = cfg.expose_error_details,
        "deployflow starting"
    );

    let store: Arc<dyn ScheduleStore> = match &cfg.database_url {
        Some(url) => {
            let pool = db::make_pool(url).await?;
            if cfg.migrate_on_startup {
                db::run_migrations(&pool).await?;
            }
            Arc::new(SchedulesRepo::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; schedules are kept in memory only");
            Arc::new(MemoryScheduleStore::new())
        }
    };

    let notifier = Notifier::from_config(build_mailer(&cfg.mail)?, &cfg.mail);
    let manager = ScheduleManager::new(store, notifier).with_policy(NotifyPolicy {
        notify_on_developers_change: cfg.notify_on_developers_change,
    });

    // ---- delivery log task ----
    let deliveries_handle = tokio::spawn(deliveries::log_deliveries(manager.subscribe()));

    // ---- API ----
    let app = api::router(api::ApiState {
        manager,
        expose_error_details: cfg.expose_error_details,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.api_addr).await?;
    tracing::info!("api listening on http://{}", cfg.api_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    deliveries_handle.abort();
    tracing::info!("server shut down gracefully");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
