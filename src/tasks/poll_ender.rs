use crate::db::Database;
use crate::handlers::close_expired_polls;
use chrono::Utc;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

/// Periodically closes open polls whose deadline has passed. Runs until the
/// surrounding task is aborted.
pub async fn check_expired_polls_task(database: Arc<Database>, period: Duration) {
    info!("Starting background task to close expired polls every {:?}", period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = Utc::now();
        debug!("Checking for expired polls at {}", now.to_rfc3339());

        match close_expired_polls(&database, now).await {
            Ok(0) => {}
            Ok(closed) => info!("Closed {} expired poll(s)", closed),
            Err(e) => error!("Failed to query for expired polls: {}", e),
        }
    }
}
