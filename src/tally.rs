//! Point totals and the tie-aware leaderboard.
//!
//! Every verified ballot awards [`FIRST_CHOICE_POINTS`], [`SECOND_CHOICE_POINTS`]
//! and [`THIRD_CHOICE_POINTS`] to its three picks. Candidates are ordered by
//! total points, highest first, with equal totals ordered by candidate ID.
//! Ranks are dense: tied candidates share a rank and the next lower total gets
//! the next integer.

use std::collections::HashMap;

use crate::model::{common::ballot::Placement, db::Ballot, mongodb::Id};

pub const FIRST_CHOICE_POINTS: u32 = 5;
pub const SECOND_CHOICE_POINTS: u32 = 3;
pub const THIRD_CHOICE_POINTS: u32 = 1;

/// Default number of entries on the live leaderboard.
pub const LIVE_RESULTS_LIMIT: usize = 30;

pub fn points_for(placement: Placement) -> u32 {
    match placement {
        Placement::First => FIRST_CHOICE_POINTS,
        Placement::Second => SECOND_CHOICE_POINTS,
        Placement::Third => THIRD_CHOICE_POINTS,
    }
}

/// One row of the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub rank: u32,
    pub candidate: Id,
    pub points: u32,
}

/// A candidate's position on the full leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Ranked(u32),
    /// The candidate has no points.
    Unranked,
}

impl Rank {
    pub fn position(&self) -> Option<u32> {
        match self {
            Self::Ranked(rank) => Some(*rank),
            Self::Unranked => None,
        }
    }
}

/// How often a candidate was placed at each position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteBreakdown {
    pub first: u32,
    pub second: u32,
    pub third: u32,
    pub points: u32,
}

/// Total points per candidate. Candidates without points are absent.
pub fn tally(ballots: &[Ballot]) -> HashMap<Id, u32> {
    let mut totals = HashMap::new();
    for ballot in ballots {
        for (placement, candidate) in ballot.picks.placements() {
            *totals.entry(candidate).or_insert(0) += points_for(placement);
        }
    }
    totals
}

/// Totals ordered by points descending, then candidate ID ascending.
fn ordered_totals(ballots: &[Ballot]) -> Vec<(Id, u32)> {
    let mut totals: Vec<_> = tally(ballots).into_iter().collect();
    totals.sort_unstable_by(|(a, a_points), (b, b_points)| {
        b_points.cmp(a_points).then_with(|| a.cmp(b))
    });
    totals
}

/// Assign dense ranks to already ordered totals.
fn dense_ranks(totals: impl IntoIterator<Item = (Id, u32)>) -> Vec<Standing> {
    let mut standings: Vec<Standing> = Vec::new();
    for (candidate, points) in totals {
        let rank = match standings.last() {
            None => 1,
            Some(previous) if previous.points == points => previous.rank,
            Some(previous) => previous.rank + 1,
        };
        standings.push(Standing {
            rank,
            candidate,
            points,
        });
    }
    standings
}

/// The top `limit` candidates of the given verified ballots.
pub fn compute_leaderboard(ballots: &[Ballot], limit: usize) -> Vec<Standing> {
    dense_ranks(ordered_totals(ballots).into_iter().take(limit))
}

/// Where the candidate stands on the untruncated leaderboard.
pub fn rank_of(candidate: Id, ballots: &[Ballot]) -> Rank {
    dense_ranks(ordered_totals(ballots))
        .into_iter()
        .find(|standing| standing.candidate == candidate)
        .map_or(Rank::Unranked, |standing| Rank::Ranked(standing.rank))
}

pub fn vote_breakdown(candidate: Id, ballots: &[Ballot]) -> VoteBreakdown {
    let mut breakdown = VoteBreakdown::default();
    for placement in ballots
        .iter()
        .filter_map(|ballot| ballot.picks.placement_of(candidate))
    {
        match placement {
            Placement::First => breakdown.first += 1,
            Placement::Second => breakdown.second += 1,
            Placement::Third => breakdown.third += 1,
        }
        breakdown.points += points_for(placement);
    }
    breakdown
}
