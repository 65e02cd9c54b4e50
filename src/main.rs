mod auth;
mod clock;
mod config;
mod directory;
mod lifecycle;
mod middleware;
mod notify;
mod slots;

mod db;
mod error;
mod models;
mod routes;

use std::sync::Arc;

use crate::{
    clock::SystemClock,
    config::Config,
    models::AppState,
    notify::{LogNotifier, NotificationQueue, Notifier, SmtpNotifier},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;

    let notifier: Arc<dyn Notifier> = match cfg.smtp.clone() {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp)),
        None => {
            tracing::info!("SMTP not configured; notifications will be logged only");
            Arc::new(LogNotifier)
        }
    };
    let (notify, rx) = NotificationQueue::new();
    tokio::spawn(notify::run_worker(rx, notifier));

    let state = AppState {
        db: pool,
        clock: Arc::new(SystemClock),
        notify,
        schedule: cfg.schedule.clone(),
    };

    // Allow browser clients of the main platform to call the API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
