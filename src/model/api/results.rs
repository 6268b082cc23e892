use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ApiId;
use crate::model::{common::Year, db::Candidate};
use crate::tally::Standing;

/// One leaderboard row, with the candidate's details resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingDesc {
    pub rank: u32,
    pub candidate_id: ApiId,
    pub name: String,
    pub country: String,
    pub club: Option<String>,
    pub slug: String,
    pub points: u32,
}

impl StandingDesc {
    /// Attach candidate details to a standing. Candidates missing from the
    /// slate are still listed, under their ID.
    pub fn new(standing: Standing, slate: &[Candidate]) -> Self {
        let candidate = slate.iter().find(|c| c.id == standing.candidate);
        Self {
            rank: standing.rank,
            candidate_id: standing.candidate.into(),
            name: candidate
                .map_or_else(|| standing.candidate.to_string(), |c| c.player_name.clone()),
            country: candidate.map(|c| c.country.clone()).unwrap_or_default(),
            club: candidate.and_then(|c| c.club.clone()),
            slug: candidate.map(|c| c.slug.clone()).unwrap_or_default(),
            points: standing.points,
        }
    }
}

/// The leaderboard of one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    pub year: Year,
    pub results: Vec<StandingDesc>,
}

impl Leaderboard {
    pub fn new(year: Year, standings: Vec<Standing>, slate: &[Candidate]) -> Self {
        Self {
            year,
            results: standings
                .into_iter()
                .map(|standing| StandingDesc::new(standing, slate))
                .collect(),
        }
    }
}

/// The live leaderboard of the active year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveResults {
    #[serde(flatten)]
    pub leaderboard: Leaderboard,
    /// Number of verified ballots counted.
    pub total_votes: usize,
    pub deadline: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}
