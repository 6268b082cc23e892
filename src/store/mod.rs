//! Storage collaborators of the voting core.
//!
//! The workflow and web layer only ever talk to these traits. Two backends
//! implement all of them: [`MongoStore`] for production and [`MemoryStore`]
//! for tests and local experiments.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    common::{ballot::VerificationToken, email::Email, Year},
    db::{
        AwardResult, Ballot, Candidate, NewAwardResult, NewBallot, NewCandidate, NewPlayer, Player,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Read access to the nominees of each award year.
#[rocket::async_trait]
pub trait CandidateProvider: Send + Sync {
    /// All candidates nominated for the given year.
    async fn candidates_for_year(&self, year: Year) -> Result<Vec<Candidate>>;

    /// The latest year that has any candidates, if there are candidates at all.
    async fn max_year_with_candidates(&self) -> Result<Option<Year>>;

    /// Look up a candidate by its year-scoped slug.
    async fn candidate_by_slug(&self, year: Year, slug: &str) -> Result<Option<Candidate>>;
}

/// Persistence of ballots. Implementations guarantee that at most one ballot
/// exists per (email, year), whatever its state.
#[rocket::async_trait]
pub trait BallotRepository: Send + Sync {
    /// The ballot for this voter and year, pending or verified.
    async fn find_ballot(&self, email: &Email, year: Year) -> Result<Option<Ballot>>;

    /// The verified ballot for this voter and year.
    async fn find_verified_ballot(&self, email: &Email, year: Year) -> Result<Option<Ballot>>;

    /// Store a new ballot. Fails with a conflict if a ballot already exists
    /// for the same (email, year).
    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Ballot>;

    /// Delete a ballot, but only while it is still pending verification.
    /// Returns whether anything was deleted.
    async fn delete_ballot(&self, id: Id) -> Result<bool>;

    /// Every verified ballot for the given year.
    async fn find_verified_ballots_for_year(&self, year: Year) -> Result<Vec<Ballot>>;

    /// The pending ballot carrying this token.
    async fn find_by_token(&self, token: &VerificationToken) -> Result<Option<Ballot>>;

    /// Atomically move a pending ballot to verified and discard its token.
    /// Returns false if the ballot was no longer pending with that token,
    /// e.g. because a concurrent request redeemed it first.
    async fn mark_verified(&self, ballot: &Ballot) -> Result<bool>;
}

/// Read access to finalised results of past years.
#[rocket::async_trait]
pub trait ResultArchive: Send + Sync {
    /// A page of results, newest year first and by rank within a year,
    /// together with the total number of results.
    async fn award_results(&self, skip: u64, limit: u64) -> Result<(Vec<AwardResult>, u64)>;
}

/// Write access to reference data, used when importing players, candidates and results.
#[rocket::async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Find a player by name, creating them if they don't exist yet.
    async fn upsert_player(&self, player: NewPlayer) -> Result<Player>;

    /// Nominate a candidate. The candidate's slug is made unique within its
    /// year by appending a counter if needed.
    async fn add_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    /// Record a historical result, replacing any existing result for the same
    /// (year, rank) or (year, player).
    async fn record_award_result(&self, result: NewAwardResult) -> Result<AwardResult>;
}

/// Everything the server needs from storage.
pub trait Store: CandidateProvider + BallotRepository + ResultArchive + ReferenceStore {}

impl<T> Store for T where T: CandidateProvider + BallotRepository + ResultArchive + ReferenceStore {}

/// The store as held in Rocket's managed state.
pub type DynStore = Arc<dyn Store>;
