use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use envconfig::Envconfig;
use eyre::Result;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use registration_common::handler::FormHandler;
use registration_common::metrics::setup_metrics_routes;
use registration_common::store::postgres::PgSubmissionStore;
use registration_common::writer::SubmissionWriter;

use config::Config;
use handlers::AppState;

mod config;
mod handlers;
mod keepalive;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("Shutting down gracefully...");
}

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await?;

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    if config.webhook_secret.is_empty() {
        eyre::bail!("WEBHOOK_SECRET must not be empty");
    }

    let store = PgSubmissionStore::new(&config.database_url, config.max_pg_connections).await?;
    if config.run_migrations {
        store.migrate().await?;
    }

    // Every stored subscription id must be known before the first submission is accepted.
    let writer = SubmissionWriter::new(Arc::new(store)).await?;
    let handler = FormHandler::new(writer, config.form_layout());

    let state = AppState::new(handler, &config.webhook_secret);
    let app = handlers::add_routes(
        Router::new(),
        state,
        config.max_body_size,
        config.concurrency_limit,
    );
    let app = if config.enable_metrics {
        setup_metrics_routes(app)?
    } else {
        app
    };
    let app = app.layer(TraceLayer::new_for_http());

    if let Some(base_url) = &config.base_url {
        tokio::spawn(keepalive::keepalive_loop(
            reqwest::Client::new(),
            keepalive::health_url(base_url),
            Duration::from_secs(config.keepalive_interval_secs),
        ));
    }

    listen(app, config.bind()).await
}

#[tokio::main]
async fn main() {
    let fmt_layer = fmt::layer().with_target(true).with_level(true).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    if let Err(e) = run(config).await {
        tracing::error!("registration-api exited with error: {:?}", e);
        std::process::exit(1);
    }
}
