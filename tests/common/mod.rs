#![allow(dead_code)]

use slider_vote::config::Config;
use slider_vote::db::Database;
use slider_vote::handlers;
use slider_vote::models::{OptionId, Poll, PollOption};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A database in its own file under the temp dir, removed on drop.
pub struct TestDb {
    pub db: Arc<Database>,
    path: PathBuf,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub async fn setup() -> TestDb {
    let _ = env_logger::builder().is_test(true).try_init();

    let path = std::env::temp_dir().join(format!("slider-vote-test-{}.db", Uuid::new_v4()));
    let config = Config {
        database_url: format!("sqlite://{}", path.display()),
        max_connections: 8,
        busy_timeout: Duration::from_secs(10),
        check_interval: Duration::from_secs(60),
    };

    let db = Database::connect(&config).await.expect("test database");
    TestDb {
        db: Arc::new(db),
        path,
    }
}

/// Creates a poll with the given option labels and publishes it.
pub async fn open_poll(db: &Database, labels: &[&str]) -> (Poll, Vec<PollOption>) {
    let poll = handlers::create_poll(db, "admin", "Where should we eat?", None)
        .await
        .unwrap();
    let mut options = Vec::new();
    for label in labels {
        options.push(handlers::add_option(db, &poll.id, label).await.unwrap());
    }
    let poll = handlers::publish_poll(db, &poll.id).await.unwrap();
    (poll, options)
}

pub async fn register(db: &Database, poll_id: &str, voters: &[&str]) {
    for voter in voters {
        db.register_voter(poll_id, voter).await.unwrap();
    }
}

pub fn ballot(options: &[PollOption], values: &[f64]) -> BTreeMap<OptionId, f64> {
    options
        .iter()
        .zip(values)
        .map(|(option, value)| (option.id.clone(), *value))
        .collect()
}
