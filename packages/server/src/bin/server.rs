// Main entry point for the post service

use std::sync::Arc;

use anyhow::{Context, Result};
use post_service_core::domains::likes::effects::{
    LikeConsumerGroup, LikeEventHandler, NatsDeadLetterSink, Reconciler, RetryPolicy,
};
use post_service_core::kernel::{ensure_streams, JetStreamPublisher, NatsPublisher, ServerDeps};
use post_service_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,post_service_core=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting post service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        partitions = config.likes.partitions,
        consumer_group = %config.likes.consumer_group,
        "Configuration loaded"
    );

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Connect to the broker and provision streams
    tracing::info!(url = %config.nats_url, "Connecting to NATS...");
    let client = async_nats::connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    let jetstream = async_nats::jetstream::new(client.clone());
    ensure_streams(&jetstream).await?;
    tracing::info!("JetStream streams ready");

    let nats: Arc<dyn NatsPublisher> = Arc::new(JetStreamPublisher::new(jetstream.clone()));
    let deps = ServerDeps::new(pool.clone(), nats.clone(), config.likes.partitions);

    // Like consumers
    let shutdown = CancellationToken::new();
    let handler = Arc::new(LikeEventHandler::new(
        Arc::new(Reconciler::new(pool.clone())),
        Arc::new(NatsDeadLetterSink::new(nats)),
        RetryPolicy::from_config(&config.likes),
    ));
    let mut consumers = LikeConsumerGroup::new(jetstream, handler, config.likes.clone())
        .spawn(shutdown.clone())
        .await?;

    // Start server
    let app = build_app(deps);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    // HTTP is down; let in-flight transitions settle before disconnecting.
    shutdown.cancel();
    tracing::info!(grace_secs = config.shutdown_grace.as_secs(), "Waiting for like consumers");
    let drained = tokio::time::timeout(config.shutdown_grace, async {
        while let Some(joined) = consumers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Like consumer failed"),
                Err(e) => tracing::error!(error = %e, "Like consumer panicked"),
            }
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Like consumers did not stop in time; unacked events will be redelivered");
        consumers.abort_all();
    }

    if let Err(e) = client.flush().await {
        tracing::warn!(error = %e, "Failed to flush NATS connection");
    }
    pool.close().await;

    tracing::info!("Post service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
