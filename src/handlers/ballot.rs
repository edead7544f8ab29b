use log::{debug, info};
use std::collections::{BTreeMap, HashSet};

use crate::db::Database;
use crate::error::{PollError, Result};
use crate::models::{BallotReceipt, OptionId, PollStatus, Score};
use crate::registry::VoterRegistry;

/// Creates the voter's ballot or atomically replaces all of its scores.
///
/// Fails with `InvalidState` unless the poll is open, `Unauthorized` for an
/// identity the registry does not know, and `Validation` for an empty ballot,
/// a foreign option or a value outside [0, 1].
pub async fn submit_or_update_ballot(
    database: &Database,
    registry: &dyn VoterRegistry,
    poll_id: &str,
    voter_id: &str,
    scores: &BTreeMap<OptionId, f64>,
) -> Result<BallotReceipt> {
    let poll = database.get_poll(poll_id).await?;
    if poll.status != PollStatus::Open {
        return Err(PollError::InvalidState {
            poll_id: poll_id.to_string(),
            expected: PollStatus::Open,
            actual: poll.status,
        });
    }

    if !registry.is_registered(poll_id, voter_id).await? {
        return Err(PollError::Unauthorized(poll_id.to_string()));
    }

    let known: HashSet<OptionId> = database
        .list_options(poll_id)
        .await?
        .into_iter()
        .map(|option| option.id)
        .collect();
    let scores = validate_scores(&known, scores)?;

    let receipt = database.upsert_ballot(poll_id, voter_id, &scores).await?;

    if receipt.was_update {
        debug!("Replaced ballot {} on poll {}", receipt.ballot_id, poll_id);
    } else {
        info!("New ballot {} on poll {}", receipt.ballot_id, poll_id);
    }

    Ok(receipt)
}

fn validate_scores(known: &HashSet<OptionId>, scores: &BTreeMap<OptionId, f64>) -> Result<Vec<Score>> {
    if scores.is_empty() {
        return Err(PollError::Validation("a ballot must score at least one option".to_string()));
    }

    scores
        .iter()
        .map(|(option_id, value)| {
            if !known.contains(option_id) {
                return Err(PollError::Validation(format!(
                    "option {} does not belong to this poll",
                    option_id
                )));
            }
            if !value.is_finite() || !(0.0..=1.0).contains(value) {
                return Err(PollError::Validation(format!(
                    "score {} for option {} is outside [0, 1]",
                    value, option_id
                )));
            }
            Ok(Score {
                option_id: option_id.clone(),
                value: *value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(ids: &[&str]) -> HashSet<OptionId> {
        ids.iter().map(|id| OptionId::from(*id)).collect()
    }

    #[test]
    fn accepts_bounds_inclusive() {
        let scores = BTreeMap::from([(OptionId::from("a"), 0.0), (OptionId::from("b"), 1.0)]);
        let validated = validate_scores(&known(&["a", "b"]), &scores).unwrap();
        assert_eq!(validated.len(), 2);
        assert_eq!(validated[0].option_id.as_str(), "a");
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            let scores = BTreeMap::from([(OptionId::from("a"), bad)]);
            assert!(matches!(
                validate_scores(&known(&["a"]), &scores),
                Err(PollError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_unknown_option_and_empty_ballot() {
        let scores = BTreeMap::from([(OptionId::from("zzz"), 0.5)]);
        assert!(matches!(
            validate_scores(&known(&["a"]), &scores),
            Err(PollError::Validation(_))
        ));
        assert!(matches!(
            validate_scores(&known(&["a"]), &BTreeMap::new()),
            Err(PollError::Validation(_))
        ));
    }
}
