//! `smsproxy` server: `POST /messages` and `GET /balance` in front of MessageBird.

use std::sync::Arc;

use sms_messagebird::MessageBirdClient;
use sms_web_axum::{router, AppState};
use smsproxy::{config::AppConfig, dispatch::Dispatcher, logging::init_tracing, rate_limiter};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    if config.carrier.access_key.is_empty() {
        warn!("no carrier access key configured (SMSPROXY__CARRIER__ACCESS_KEY)");
    }
    let carrier = Arc::new(MessageBirdClient::with_base_url(
        config.carrier.access_key.clone(),
        config.carrier.base_url.clone(),
    ));
    let limiter = rate_limiter::from_config(&config.rate_limit);
    let (dispatcher, worker) = Dispatcher::spawn(carrier, limiter, &config.dispatch);

    match dispatcher.balance().await {
        Ok(balance) => info!(
            payment = %balance.payment,
            kind = %balance.kind,
            amount = balance.amount,
            "carrier balance"
        ),
        Err(e) => warn!(error = %e, "could not fetch carrier balance"),
    }

    let app = router(AppState::new(Arc::new(dispatcher.clone())));
    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        queue_capacity = config.dispatch.queue_capacity,
        rate_limited = config.rate_limit.enabled,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(dispatcher.clone()))
        .await?;

    dispatcher.stop();
    worker.await?;
    info!("server gracefully stopped");
    Ok(())
}

/// Resolves on SIGINT/SIGTERM after stopping the dispatcher, so requests still
/// waiting on an outcome are answered before the server drains.
async fn shutdown_signal(dispatcher: Dispatcher) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C signal"),
        () = terminate => info!("received SIGTERM signal"),
    }

    info!("shutting down the server...");
    dispatcher.stop();
}
