use log::{error, info};
use slider_vote::config::Config;
use slider_vote::db::Database;
use slider_vote::tasks;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let database = match Database::connect(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let ender = tokio::spawn(tasks::poll_ender::check_expired_polls_task(
        Arc::clone(&database),
        config.check_interval,
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    ender.abort();
    database.pool().close().await;
}
