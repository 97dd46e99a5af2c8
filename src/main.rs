use axum::Router;
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use deskserver::bridge;
use deskserver::config::AppConfig;
use deskserver::mail::MailClient;
use deskserver::shared::state::AppState;
use deskserver::shared::utils::{create_conn, run_migrations};
use deskserver::{tickets, users};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database.url)?;
    run_migrations(&pool)?;

    let mail = MailClient::new(config.smtp.clone(), config.imap.clone());
    let state = Arc::new(AppState {
        conn: pool,
        config: config.clone(),
        mail,
    });

    bridge::spawn_bridge(state.clone());

    let app = Router::new()
        .merge(users::configure())
        .merge(tickets::configure())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
