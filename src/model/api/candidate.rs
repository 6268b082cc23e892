use rocket::FromForm;
use serde::{Deserialize, Serialize};

use super::id::ApiId;
use crate::model::{
    common::Year,
    db::{Candidate, CandidateProfile},
};
use crate::tally::{Rank, VoteBreakdown};

/// The public face of a candidate, as listed on the home and voting pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: ApiId,
    pub year: Year,
    pub player_id: ApiId,
    pub name: String,
    pub country: String,
    pub club: Option<String>,
    pub slug: String,
}

impl From<Candidate> for CandidateSummary {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            year: candidate.candidate.year,
            player_id: candidate.candidate.player_id.into(),
            name: candidate.candidate.player_name,
            country: candidate.candidate.country,
            club: candidate.candidate.club,
            slug: candidate.candidate.slug,
        }
    }
}

/// Optional filters on the candidate listing.
#[derive(Debug, Clone, Default, FromForm)]
pub struct CandidateFilter {
    /// Exact club name.
    pub club: Option<String>,
    /// Exact country name.
    pub country: Option<String>,
    /// Case-insensitive substring of the player name.
    pub search: Option<String>,
}

impl CandidateFilter {
    pub fn matches(&self, candidate: &Candidate) -> bool {
        let club =
            non_empty(&self.club).map_or(true, |club| candidate.club.as_deref() == Some(club));
        let country = non_empty(&self.country).map_or(true, |country| candidate.country == country);
        let search = non_empty(&self.search).map_or(true, |search| {
            candidate
                .player_name
                .to_lowercase()
                .contains(&search.to_lowercase())
        });
        club && country && search
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Contenders of the active year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateListing {
    pub year: Year,
    /// Candidates matching the filter.
    pub candidates: Vec<CandidateSummary>,
    /// Every club of the year's candidates, for building filters.
    pub clubs: Vec<String>,
    /// Every country of the year's candidates, for building filters.
    pub countries: Vec<String>,
}

/// A candidate's current standing in the fan vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VotingStats {
    pub first_votes: u32,
    pub second_votes: u32,
    pub third_votes: u32,
    pub total_points: u32,
    /// `None` while the candidate has no points.
    pub current_rank: Option<u32>,
}

impl VotingStats {
    pub fn new(breakdown: VoteBreakdown, rank: Rank) -> Self {
        Self {
            first_votes: breakdown.first,
            second_votes: breakdown.second,
            third_votes: breakdown.third,
            total_points: breakdown.points,
            current_rank: rank.position(),
        }
    }
}

/// Everything on a candidate's page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateDetail {
    #[serde(flatten)]
    pub summary: CandidateSummary,
    #[serde(flatten)]
    pub profile: CandidateProfile,
    pub voting_stats: VotingStats,
    /// A few other candidates of the same year.
    pub other_candidates: Vec<CandidateSummary>,
}
