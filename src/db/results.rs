use chrono::{SubsecRound, Utc};
use log::debug;
use sqlx::Row;
use uuid::Uuid;

use super::{Database, fetch_options, from_db_time, to_db_time};
use crate::error::{PollError, Result};
use crate::models::{OptionId, PollStatus, RankedOption, ResultSnapshot, VotingMethod};
use crate::voting::{self, CastScore};

impl Database {
    /// Closes an open poll and persists its ranking, all in one transaction.
    ///
    /// The first statement is a compare-and-set on the poll status, so the
    /// transaction holds the write lock before anything is read. Of several
    /// concurrent closes exactly one flips the status; the others see zero
    /// affected rows and fail without writing.
    pub async fn close_and_snapshot(&self, poll_id: &str) -> Result<ResultSnapshot> {
        // Stored timestamps keep microseconds.
        let computed_at = Utc::now().trunc_subsecs(6);
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE polls
            SET status = 'closed', closed_at = ?
            WHERE id = ? AND status = 'open'
            "#,
        )
        .bind(to_db_time(computed_at))
        .bind(poll_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Err(self.state_error(poll_id, PollStatus::Open).await);
        }

        let options = fetch_options(&mut *tx, poll_id).await?;

        let scores: Vec<CastScore> = sqlx::query(
            r#"
            SELECT b.id AS ballot_id, b.revision, s.option_id, s.value
            FROM scores s
            JOIN ballots b ON b.id = s.ballot_id
            WHERE b.poll_id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| CastScore {
            ballot_id: row.get("ballot_id"),
            revision: row.get("revision"),
            option_id: OptionId(row.get("option_id")),
            value: row.get("value"),
        })
        .collect();

        debug!(
            "Tallying poll {}: {} options, {} scores",
            poll_id,
            options.len(),
            scores.len()
        );

        let snapshot = ResultSnapshot {
            id: Uuid::new_v4().to_string(),
            poll_id: poll_id.to_string(),
            method: VotingMethod::BipolarMedian,
            computed_at,
            ranking: voting::calculate_results(&options, &scores),
            inputs_hash: voting::inputs_hash(&scores),
        };

        sqlx::query(
            r#"
            INSERT INTO result_snapshots (id, poll_id, method, computed_at, ranking, inputs_hash)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.poll_id)
        .bind(snapshot.method.as_str())
        .bind(to_db_time(snapshot.computed_at))
        .bind(serde_json::to_string(&snapshot.ranking)?)
        .bind(&snapshot.inputs_hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE polls SET snapshot_id = ? WHERE id = ?")
            .bind(&snapshot.id)
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(snapshot)
    }

    /// The poll's linked final snapshot. Sealed until the poll is closed.
    pub async fn get_snapshot(&self, poll_id: &str) -> Result<ResultSnapshot> {
        let poll = self.get_poll(poll_id).await?;
        if poll.status != PollStatus::Closed {
            return Err(PollError::Sealed(poll_id.to_string()));
        }
        let snapshot_id = poll
            .snapshot_id
            .ok_or_else(|| PollError::Decode(format!("closed poll {} has no snapshot", poll_id)))?;

        let row = sqlx::query(
            r#"
            SELECT id, poll_id, method, computed_at, ranking, inputs_hash
            FROM result_snapshots
            WHERE id = ?
            "#,
        )
        .bind(&snapshot_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PollError::Decode(format!("snapshot {} is missing", snapshot_id)))?;

        let ranking: Vec<RankedOption> = serde_json::from_str(&row.get::<String, _>("ranking"))?;

        Ok(ResultSnapshot {
            id: row.get("id"),
            poll_id: row.get("poll_id"),
            method: row.get::<String, _>("method").parse()?,
            computed_at: from_db_time(&row.get::<String, _>("computed_at"))?,
            ranking,
            inputs_hash: row.get("inputs_hash"),
        })
    }

    pub async fn count_snapshots(&self, poll_id: &str) -> Result<i64> {
        let count = sqlx::query("SELECT COUNT(*) AS n FROM result_snapshots WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("n");
        Ok(count)
    }
}
