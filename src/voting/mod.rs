pub mod aggregate;
pub mod ranking;

use crate::models::{OptionId, PollOption, RankedOption};
use aggregate::{OptionStats, compute_stats, to_signed};
use log::warn;
use std::collections::BTreeMap;

/// One committed score as read at close time.
#[derive(Debug, Clone, PartialEq)]
pub struct CastScore {
    pub ballot_id: String,
    pub revision: i64,
    pub option_id: OptionId,
    pub value: f64,
}

/// Groups raw scores per option and computes each option's statistics.
/// Every option gets an entry, including those nobody scored.
pub fn option_stats(options: &[PollOption], scores: &[CastScore]) -> BTreeMap<OptionId, OptionStats> {
    let mut signed: BTreeMap<OptionId, Vec<f64>> = options
        .iter()
        .map(|option| (option.id.clone(), Vec::new()))
        .collect();

    for score in scores {
        match signed.get_mut(&score.option_id) {
            Some(values) => values.push(to_signed(score.value)),
            None => warn!("Ignoring score for unknown option {}", score.option_id),
        }
    }

    signed
        .into_iter()
        .map(|(option_id, values)| (option_id, compute_stats(values)))
        .collect()
}

/// Runs the full pipeline: signed conversion, aggregation, veto, ranking.
pub fn calculate_results(options: &[PollOption], scores: &[CastScore]) -> Vec<RankedOption> {
    let stats = option_stats(options, scores);

    let ranked = options
        .iter()
        .map(|option| {
            let s = stats.get(&option.id).copied().unwrap_or_default();
            RankedOption {
                option_id: option.id.clone(),
                label: option.label.clone(),
                median: s.median,
                p10: s.p10,
                p90: s.p90,
                mean: s.mean,
                neg_share: s.neg_share,
                veto: s.veto,
                rank: 0,
            }
        })
        .collect();

    ranking::assign_ranks(ranked)
}

/// Audit fingerprint of the exact score set used for a ranking. Lines are
/// sorted so the hash ignores read order but changes with any ballot change.
pub fn inputs_hash(scores: &[CastScore]) -> String {
    let mut lines: Vec<String> = scores
        .iter()
        .map(|s| format!("{}:{}:{}:{:016x}", s.ballot_id, s.revision, s.option_id, s.value.to_bits()))
        .collect();
    lines.sort();
    sha256::digest(lines.join("\n"))
}
