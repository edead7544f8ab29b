use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PollError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Draft,
    Open,
    Closed,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Draft => "draft",
            PollStatus::Open => "open",
            PollStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollStatus {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PollStatus::Draft),
            "open" => Ok(PollStatus::Open),
            "closed" => Ok(PollStatus::Closed),
            other => Err(PollError::Decode(format!("unknown poll status: {}", other))),
        }
    }
}

/// The aggregation rule applied at close. Only one exists; it is recorded in
/// every snapshot so stored results stay self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingMethod {
    #[serde(rename = "bipolar-median-soft-veto")]
    BipolarMedian,
}

impl VotingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMethod::BipolarMedian => "bipolar-median-soft-veto",
        }
    }
}

impl FromStr for VotingMethod {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bipolar-median-soft-veto" => Ok(VotingMethod::BipolarMedian),
            other => Err(PollError::Decode(format!("unknown voting method: {}", other))),
        }
    }
}

/// Identifier of an option. Ordering is the final tie-break of the ranking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub String);

impl OptionId {
    pub fn new() -> Self {
        OptionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionId {
    fn from(s: &str) -> Self {
        OptionId(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub creator_id: String,
    pub question: String,
    pub status: PollStatus,
    pub created_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
    pub share_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub snapshot_id: Option<String>,
}

impl Poll {
    /// Fails with `Validation` when the deadline would fall outside the
    /// representable time range.
    pub fn new(
        creator_id: String,
        question: String,
        duration_minutes: Option<i64>,
    ) -> Result<Self, PollError> {
        let now = Utc::now();
        let closes_at = duration_minutes
            .map(|mins| {
                chrono::Duration::try_minutes(mins)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .ok_or_else(|| {
                        PollError::Validation(format!("duration of {} minutes is out of range", mins))
                    })
            })
            .transpose()?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            creator_id,
            question,
            status: PollStatus::Draft,
            created_at: now,
            closes_at,
            share_id: None,
            published_at: None,
            closed_at: None,
            snapshot_id: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub option_id: OptionId,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub id: String,
    pub poll_id: String,
    pub voter_id: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: i64,
    pub scores: Vec<Score>,
}

/// Outcome of a ballot submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotReceipt {
    pub ballot_id: String,
    pub was_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedOption {
    pub option_id: OptionId,
    pub label: String,
    pub median: f64,
    pub p10: f64,
    pub p90: f64,
    pub mean: f64,
    pub neg_share: f64,
    pub veto: bool,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub id: String,
    pub poll_id: String,
    pub method: VotingMethod,
    pub computed_at: DateTime<Utc>,
    pub ranking: Vec<RankedOption>,
    pub inputs_hash: String,
}
