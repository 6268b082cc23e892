use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{candidate::CandidateSummary, id::ApiId};
use crate::model::common::Year;

/// What the voting page needs to render the ballot form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VotingStatus {
    pub year: Year,
    pub deadline: DateTime<Utc>,
    pub open: bool,
    /// The slate, sorted by player name.
    pub candidates: Vec<CandidateSummary>,
}

/// Response to an accepted ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBallot {
    pub ballot_id: ApiId,
    pub message: String,
}

/// Response to a redeemed verification link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedBallot {
    pub ballot_id: ApiId,
    pub message: String,
}
