use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::db::Database;
use crate::error::{PollError, Result};
use crate::models::{Poll, PollOption, ResultSnapshot};

pub async fn create_poll(
    database: &Database,
    creator_id: &str,
    question: &str,
    duration_minutes: Option<i64>,
) -> Result<Poll> {
    let question = question.trim();
    if question.is_empty() {
        return Err(PollError::Validation("question must not be empty".to_string()));
    }
    if let Some(minutes) = duration_minutes {
        if minutes <= 0 {
            return Err(PollError::Validation(format!(
                "duration must be positive, got {} minutes",
                minutes
            )));
        }
    }

    let poll = Poll::new(creator_id.to_string(), question.to_string(), duration_minutes)?;
    database.create_poll(&poll).await?;
    info!("Created draft poll {} by {}", poll.id, creator_id);
    Ok(poll)
}

pub async fn add_option(database: &Database, poll_id: &str, label: &str) -> Result<PollOption> {
    let label = label.trim();
    if label.is_empty() {
        return Err(PollError::Validation("option label must not be empty".to_string()));
    }
    database.add_option(poll_id, label).await
}

pub async fn publish_poll(database: &Database, poll_id: &str) -> Result<Poll> {
    let poll = database.publish_poll(poll_id).await?;
    info!(
        "Published poll {} with share id {}",
        poll.id,
        poll.share_id.as_deref().unwrap_or("-")
    );
    Ok(poll)
}

/// Closes an open poll and returns its final ranking. Only one of several
/// concurrent callers succeeds; the rest get `InvalidState`.
pub async fn close_poll(database: &Database, poll_id: &str) -> Result<ResultSnapshot> {
    let snapshot = database.close_and_snapshot(poll_id).await?;
    info!(
        "Closed poll {}: {} options ranked, inputs {}",
        poll_id,
        snapshot.ranking.len(),
        snapshot.inputs_hash
    );
    Ok(snapshot)
}

/// Final results; `Sealed` while the poll is still draft or open.
pub async fn get_results(database: &Database, poll_id: &str) -> Result<ResultSnapshot> {
    database.get_snapshot(poll_id).await
}

/// Closes every open poll whose deadline is before `now`. Returns how many
/// this call closed; polls closed concurrently elsewhere are skipped.
pub async fn close_expired_polls(database: &Database, now: DateTime<Utc>) -> Result<usize> {
    let expired = database.get_expired_polls(now).await?;
    let mut closed = 0;

    for poll_id in expired {
        match close_poll(database, &poll_id).await {
            Ok(_) => closed += 1,
            Err(PollError::InvalidState { .. }) => {
                warn!("Poll {} was closed before its deadline handler ran", poll_id)
            }
            Err(e) => error!("Failed to close expired poll {}: {}", poll_id, e),
        }
    }

    Ok(closed)
}
