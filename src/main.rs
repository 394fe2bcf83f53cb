use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use fresheats_api as api;
use fresheats_api::{
    common::{Clock, SystemClock},
    events::{EventHub, EventSender},
    notifications::AdminNotifier,
    repositories::Repositories,
    services::{ServiceContainer, ServiceFactory, ServiceSettings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool)
            .await
            .context("failed running migrations")?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = EventSender::new(event_tx);
    let event_hub = EventHub::new(cfg.event_channel_capacity);
    tokio::spawn(api::events::process_events(event_rx, event_hub.clone()));

    // Build services
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier = AdminNotifier::new(cfg.notifications.clone(), cfg.local_offset());
    let factory = ServiceFactory::new(
        Repositories::sql(db_arc.clone()),
        ServiceSettings::from(&cfg),
        clock.clone(),
    )
    .with_event_sender(event_sender)
    .with_notifier(Arc::new(notifier));

    let app_state = api::AppState::new(&factory, clock, Some(db_arc), event_hub);

    if cfg.reconciliation.interval_secs > 0 {
        tokio::spawn(reconciliation_loop(
            app_state.services.clone(),
            Duration::from_secs(cfg.reconciliation.interval_secs),
            Duration::from_secs(cfg.reconciliation.payment_grace_secs),
        ));
    } else {
        warn!("Reconciliation sweep disabled");
    }

    let app = api::app(app_state, cfg.cors_allowed_origins.as_deref());

    // Bind and serve
    let host: std::net::IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address '{}'", cfg.host))?;
    let addr = SocketAddr::from((host, cfg.port));
    info!("fresheats-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Repairs stranded payments and estimated ratings on a fixed interval.
async fn reconciliation_loop(services: ServiceContainer, every: Duration, payment_grace: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; skip it so startup is not slowed by a sweep.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let (payments, ratings) = services.reconcile(payment_grace).await;
        if payments + ratings > 0 {
            info!(payments, ratings, "Reconciliation sweep repaired records");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
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
    info!("Shutdown signal received");
}
