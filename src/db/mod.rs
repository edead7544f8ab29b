mod ballots;
mod results;

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{PollError, Result};
use crate::models::{OptionId, Poll, PollOption, PollStatus};

pub struct Database {
    pool: SqlitePool,
}

// Timestamps are stored as fixed-width RFC 3339 so that text comparison
// in SQL orders them chronologically.
pub(crate) fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PollError::Decode(format!("bad timestamp {:?}: {}", raw, e)))
}

fn from_db_time_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(from_db_time).transpose()
}

fn poll_from_row(row: &SqliteRow) -> Result<Poll> {
    Ok(Poll {
        id: row.get("id"),
        creator_id: row.get("creator_id"),
        question: row.get("question"),
        status: row.get::<String, _>("status").parse()?,
        created_at: from_db_time(&row.get::<String, _>("created_at"))?,
        closes_at: from_db_time_opt(row.get("closes_at"))?,
        share_id: row.get("share_id"),
        published_at: from_db_time_opt(row.get("published_at"))?,
        closed_at: from_db_time_opt(row.get("closed_at"))?,
        snapshot_id: row.get("snapshot_id"),
    })
}

/// Options of a poll in creation order, through any executor so the close
/// transaction reads the same state it writes.
pub(crate) async fn fetch_options<'e, E>(executor: E, poll_id: &str) -> Result<Vec<PollOption>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let options = sqlx::query(
        r#"
        SELECT id, label
        FROM poll_options
        WHERE poll_id = ?
        ORDER BY position
        "#,
    )
    .bind(poll_id)
    .fetch_all(executor)
    .await?
    .into_iter()
    .map(|row| PollOption {
        id: OptionId(row.get("id")),
        label: row.get("label"),
    })
    .collect();

    Ok(options)
}

impl Database {
    pub async fn connect(config: &Config) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        info!("Connected to {}", config.database_url);

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                creator_id TEXT NOT NULL,
                question TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('draft', 'open', 'closed')),
                created_at TEXT NOT NULL,
                closes_at TEXT,
                share_id TEXT UNIQUE,
                published_at TEXT,
                closed_at TEXT,
                snapshot_id TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_options (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                label TEXT NOT NULL,
                position INTEGER NOT NULL,
                UNIQUE (poll_id, label),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_voters (
                poll_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                registered_at TEXT NOT NULL,
                PRIMARY KEY (poll_id, voter_id),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                revision INTEGER NOT NULL DEFAULT 1,
                UNIQUE (poll_id, voter_id),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                ballot_id TEXT NOT NULL,
                option_id TEXT NOT NULL,
                value REAL NOT NULL CHECK (value >= 0.0 AND value <= 1.0),
                PRIMARY KEY (ballot_id, option_id),
                FOREIGN KEY (ballot_id) REFERENCES ballots(id) ON DELETE CASCADE,
                FOREIGN KEY (option_id) REFERENCES poll_options(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS result_snapshots (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL UNIQUE,
                method TEXT NOT NULL,
                computed_at TEXT NOT NULL,
                ranking TEXT NOT NULL,
                inputs_hash TEXT NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn create_poll(&self, poll: &Poll) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO polls (id, creator_id, question, status, created_at, closes_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.creator_id)
        .bind(&poll.question)
        .bind(poll.status.as_str())
        .bind(to_db_time(poll.created_at))
        .bind(poll.closes_at.map(to_db_time))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_poll(&self, poll_id: &str) -> Result<Poll> {
        let row = sqlx::query(
            r#"
            SELECT id, creator_id, question, status, created_at, closes_at,
                   share_id, published_at, closed_at, snapshot_id
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PollError::NotFound(poll_id.to_string()))?;

        poll_from_row(&row)
    }

    pub async fn list_options(&self, poll_id: &str) -> Result<Vec<PollOption>> {
        fetch_options(&self.pool, poll_id).await
    }

    /// Appends an option, only while the poll is still a draft.
    pub async fn add_option(&self, poll_id: &str, label: &str) -> Result<PollOption> {
        let option = PollOption {
            id: OptionId::new(),
            label: label.to_string(),
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO poll_options (id, poll_id, label, position)
            SELECT ?, ?, ?, (SELECT COUNT(*) FROM poll_options WHERE poll_id = ?)
            WHERE EXISTS (SELECT 1 FROM polls WHERE id = ? AND status = 'draft')
            "#,
        )
        .bind(option.id.as_str())
        .bind(poll_id)
        .bind(&option.label)
        .bind(poll_id)
        .bind(poll_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(self.state_error(poll_id, PollStatus::Draft).await);
        }

        Ok(option)
    }

    /// Moves a draft with at least two options to open and hands out its
    /// share id. Check and transition happen in a single statement.
    pub async fn publish_poll(&self, poll_id: &str) -> Result<Poll> {
        let share_id = Uuid::new_v4().simple().to_string();

        let updated = sqlx::query(
            r#"
            UPDATE polls
            SET status = 'open', share_id = ?, published_at = ?
            WHERE id = ?
              AND status = 'draft'
              AND (SELECT COUNT(*) FROM poll_options WHERE poll_id = ?) >= 2
            "#,
        )
        .bind(&share_id)
        .bind(to_db_time(Utc::now()))
        .bind(poll_id)
        .bind(poll_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let poll = self.get_poll(poll_id).await?;
            if poll.status != PollStatus::Draft {
                return Err(PollError::InvalidState {
                    poll_id: poll_id.to_string(),
                    expected: PollStatus::Draft,
                    actual: poll.status,
                });
            }
            return Err(PollError::TooFewOptions(poll_id.to_string()));
        }

        self.get_poll(poll_id).await
    }

    /// Records a voter identity issued by the identity service for this poll.
    /// Registering the same identity twice is a no-op. The not-closed guard
    /// is part of the insert, so a concurrent close cannot slip in between.
    pub async fn register_voter(&self, poll_id: &str, voter_id: &str) -> Result<()> {
        // DO UPDATE rather than DO NOTHING so a repeat registration still
        // counts as an affected row.
        let affected = sqlx::query(
            r#"
            INSERT INTO poll_voters (poll_id, voter_id, registered_at)
            SELECT ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM polls WHERE id = ? AND status <> 'closed')
            ON CONFLICT(poll_id, voter_id)
            DO UPDATE SET registered_at = poll_voters.registered_at
            "#,
        )
        .bind(poll_id)
        .bind(voter_id)
        .bind(to_db_time(Utc::now()))
        .bind(poll_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(self.state_error(poll_id, PollStatus::Open).await);
        }

        Ok(())
    }

    pub async fn is_voter_registered(&self, poll_id: &str, voter_id: &str) -> Result<bool> {
        let found = sqlx::query("SELECT 1 FROM poll_voters WHERE poll_id = ? AND voter_id = ?")
            .bind(poll_id)
            .bind(voter_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        Ok(found)
    }

    /// Open polls whose deadline has passed.
    pub async fn get_expired_polls(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let ids = sqlx::query(
            r#"
            SELECT id
            FROM polls
            WHERE closes_at IS NOT NULL AND closes_at < ? AND status = 'open'
            ORDER BY closes_at
            "#,
        )
        .bind(to_db_time(now))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("id"))
        .collect();

        Ok(ids)
    }

    /// Explains why a conditional write on `poll_id` touched no rows.
    pub(crate) async fn state_error(&self, poll_id: &str, expected: PollStatus) -> PollError {
        match self.get_poll(poll_id).await {
            Ok(poll) => PollError::InvalidState {
                poll_id: poll_id.to_string(),
                expected,
                actual: poll.status,
            },
            Err(e) => e,
        }
    }
}
