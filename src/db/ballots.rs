use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::{Database, from_db_time, to_db_time};
use crate::error::Result;
use crate::models::{Ballot, BallotReceipt, OptionId, PollStatus, Score};

impl Database {
    /// Creates the voter's ballot or replaces its whole score set, in one
    /// transaction. The (poll_id, voter_id) UNIQUE constraint settles racing
    /// first submissions; the open-status guard is part of the insert so a
    /// concurrent close cannot slip in between check and write.
    pub async fn upsert_ballot(
        &self,
        poll_id: &str,
        voter_id: &str,
        scores: &[Score],
    ) -> Result<BallotReceipt> {
        let now = to_db_time(Utc::now());
        let candidate_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO ballots (id, poll_id, voter_id, submitted_at, updated_at, revision)
            SELECT ?, ?, ?, ?, ?, 1
            WHERE EXISTS (SELECT 1 FROM polls WHERE id = ? AND status = 'open')
            ON CONFLICT(poll_id, voter_id)
            DO UPDATE SET updated_at = excluded.updated_at, revision = ballots.revision + 1
            RETURNING id, revision
            "#,
        )
        .bind(&candidate_id)
        .bind(poll_id)
        .bind(voter_id)
        .bind(&now)
        .bind(&now)
        .bind(poll_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(self.state_error(poll_id, PollStatus::Open).await);
        };

        let ballot_id: String = row.get("id");
        let revision: i64 = row.get("revision");

        sqlx::query("DELETE FROM scores WHERE ballot_id = ?")
            .bind(&ballot_id)
            .execute(&mut *tx)
            .await?;

        for score in scores {
            sqlx::query(
                r#"
                INSERT INTO scores (ballot_id, option_id, value)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&ballot_id)
            .bind(score.option_id.as_str())
            .bind(score.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(BallotReceipt {
            ballot_id,
            was_update: revision > 1,
        })
    }

    /// The voter's current ballot with its scores, if any. Read in one
    /// transaction so the scores belong to the returned revision.
    pub async fn get_ballot(&self, poll_id: &str, voter_id: &str) -> Result<Option<Ballot>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query(
            r#"
            SELECT id, poll_id, voter_id, submitted_at, updated_at, revision
            FROM ballots
            WHERE poll_id = ? AND voter_id = ?
            "#,
        )
        .bind(poll_id)
        .bind(voter_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let ballot_id: String = row.get("id");
        let scores = sqlx::query(
            r#"
            SELECT option_id, value
            FROM scores
            WHERE ballot_id = ?
            ORDER BY option_id
            "#,
        )
        .bind(&ballot_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|score_row| Score {
            option_id: OptionId(score_row.get("option_id")),
            value: score_row.get("value"),
        })
        .collect();

        tx.commit().await?;

        Ok(Some(Ballot {
            id: ballot_id,
            poll_id: row.get("poll_id"),
            voter_id: row.get("voter_id"),
            submitted_at: from_db_time(&row.get::<String, _>("submitted_at"))?,
            updated_at: from_db_time(&row.get::<String, _>("updated_at"))?,
            revision: row.get("revision"),
            scores,
        }))
    }

    pub async fn count_ballots(&self, poll_id: &str) -> Result<i64> {
        let count = sqlx::query("SELECT COUNT(*) AS n FROM ballots WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("n");
        Ok(count)
    }

    pub async fn count_scores(&self, poll_id: &str) -> Result<i64> {
        let count = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM scores s
            JOIN ballots b ON b.id = s.ballot_id
            WHERE b.poll_id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>("n");
        Ok(count)
    }
}
