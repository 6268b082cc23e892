use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        ballot::{BallotState, VerificationToken},
        email::Email,
        Year,
    },
    db::{
        candidate::{slugify, unique_slug},
        AwardResult, Ballot, Candidate, NewAwardResult, NewBallot, NewCandidate, NewPlayer, Player,
    },
    mongodb::Id,
};

use super::{BallotRepository, CandidateProvider, ReferenceStore, ResultArchive};

#[derive(Default)]
struct Tables {
    players: Vec<Player>,
    candidates: Vec<Candidate>,
    ballots: HashMap<Id, Ballot>,
    results: Vec<AwardResult>,
}

/// An in-process store. Every operation runs under a single lock, which gives
/// it the same atomicity guarantees as the unique indexes of [`super::MongoStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ballots stored, in any state.
    pub fn ballot_count(&self) -> usize {
        self.lock().ballots.len()
    }

    /// Snapshot of every stored ballot, in no particular order.
    pub fn ballots(&self) -> Vec<Ballot> {
        self.lock().ballots.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock can't leave the tables half-updated,
        // since every mutation is a single insert/remove.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[rocket::async_trait]
impl CandidateProvider for MemoryStore {
    async fn candidates_for_year(&self, year: Year) -> Result<Vec<Candidate>> {
        Ok(self
            .lock()
            .candidates
            .iter()
            .filter(|c| c.year == year)
            .cloned()
            .collect())
    }

    async fn max_year_with_candidates(&self) -> Result<Option<Year>> {
        Ok(self.lock().candidates.iter().map(|c| c.year).max())
    }

    async fn candidate_by_slug(&self, year: Year, slug: &str) -> Result<Option<Candidate>> {
        Ok(self
            .lock()
            .candidates
            .iter()
            .find(|c| c.year == year && c.slug == slug)
            .cloned())
    }
}

#[rocket::async_trait]
impl BallotRepository for MemoryStore {
    async fn find_ballot(&self, email: &Email, year: Year) -> Result<Option<Ballot>> {
        Ok(self
            .lock()
            .ballots
            .values()
            .find(|b| &b.email == email && b.year == year)
            .cloned())
    }

    async fn find_verified_ballot(&self, email: &Email, year: Year) -> Result<Option<Ballot>> {
        Ok(self
            .find_ballot(email, year)
            .await?
            .filter(|b| b.is_verified()))
    }

    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Ballot> {
        let mut tables = self.lock();
        let duplicate = tables
            .ballots
            .values()
            .any(|b| b.email == ballot.email && b.year == ballot.year);
        if duplicate {
            return Err(Error::Conflict(format!(
                "Ballot for {} in {} already exists",
                ballot.email, ballot.year
            )));
        }
        let ballot = Ballot {
            id: Id::new(),
            ballot,
        };
        tables.ballots.insert(ballot.id, ballot.clone());
        Ok(ballot)
    }

    async fn delete_ballot(&self, id: Id) -> Result<bool> {
        let mut tables = self.lock();
        let pending = tables.ballots.get(&id).map_or(false, |b| !b.is_verified());
        if pending {
            tables.ballots.remove(&id);
        }
        Ok(pending)
    }

    async fn find_verified_ballots_for_year(&self, year: Year) -> Result<Vec<Ballot>> {
        Ok(self
            .lock()
            .ballots
            .values()
            .filter(|b| b.year == year && b.is_verified())
            .cloned()
            .collect())
    }

    async fn find_by_token(&self, token: &VerificationToken) -> Result<Option<Ballot>> {
        Ok(self
            .lock()
            .ballots
            .values()
            .find(|b| b.token() == Some(token))
            .cloned())
    }

    async fn mark_verified(&self, ballot: &Ballot) -> Result<bool> {
        let Some(token) = ballot.token() else {
            return Ok(false);
        };
        let mut tables = self.lock();
        match tables.ballots.get_mut(&ballot.id) {
            Some(stored) if stored.token() == Some(token) => {
                stored.state = BallotState::Verified;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[rocket::async_trait]
impl ResultArchive for MemoryStore {
    async fn award_results(&self, skip: u64, limit: u64) -> Result<(Vec<AwardResult>, u64)> {
        let mut results = self.lock().results.clone();
        results.sort_by(|a, b| b.year.cmp(&a.year).then(a.rank.cmp(&b.rank)));
        let total = results.len() as u64;
        let page = results
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();
        Ok((page, total))
    }
}

#[rocket::async_trait]
impl ReferenceStore for MemoryStore {
    async fn upsert_player(&self, player: NewPlayer) -> Result<Player> {
        let mut tables = self.lock();
        if let Some(existing) = tables.players.iter().find(|p| p.name == player.name) {
            return Ok(existing.clone());
        }
        let player = Player {
            id: Id::new(),
            player,
        };
        tables.players.push(player.clone());
        Ok(player)
    }

    async fn add_candidate(&self, mut candidate: NewCandidate) -> Result<Candidate> {
        let mut tables = self.lock();
        let same_year = tables
            .candidates
            .iter()
            .filter(|c| c.year == candidate.year)
            .collect::<Vec<_>>();
        if same_year.iter().any(|c| c.player_id == candidate.player_id) {
            return Err(Error::Conflict(format!(
                "{} is already a candidate in {}",
                candidate.player_name, candidate.year
            )));
        }

        let base = if candidate.slug.is_empty() {
            slugify(&candidate.player_name)
        } else {
            candidate.slug.clone()
        };
        candidate.slug = unique_slug(&base, |slug| same_year.iter().any(|c| c.slug == slug));

        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        tables.candidates.push(candidate.clone());
        Ok(candidate)
    }

    async fn record_award_result(&self, result: NewAwardResult) -> Result<AwardResult> {
        let mut tables = self.lock();
        let existing = tables.results.iter_mut().find(|r| {
            r.year == result.year && (r.rank == result.rank || r.player_id == result.player_id)
        });
        let recorded = match existing {
            Some(existing) => {
                existing.result = result;
                existing.clone()
            }
            None => {
                let recorded = AwardResult {
                    id: Id::new(),
                    result,
                };
                tables.results.push(recorded.clone());
                recorded
            }
        };
        // Replacing by rank can leave a stale entry for the same player elsewhere.
        let (year, rank, player_id) = (recorded.year, recorded.rank, recorded.player_id);
        tables.results.retain(|r| {
            r.id == recorded.id || !(r.year == year && (r.rank == rank || r.player_id == player_id))
        });
        Ok(recorded)
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use super::*;
    use crate::model::db::{CandidateCore, PlayerCore};

    /// Contenders of the example slate: (name, country, club).
    pub const EXAMPLE_SLATE: [(&str, &str, &str); 5] = [
        ("Ousmane Dembélé", "France", "Paris Saint-Germain"),
        ("Lamine Yamal", "Spain", "Barcelona"),
        ("Vitinha", "Portugal", "Paris Saint-Germain"),
        ("Mohamed Salah", "Egypt", "Liverpool"),
        ("Raphinha", "Brazil", "Barcelona"),
    ];

    impl MemoryStore {
        /// A store holding the example slate for the given year.
        pub async fn with_example_slate(year: Year) -> Self {
            let store = Self::new();
            for (name, country, club) in EXAMPLE_SLATE {
                let player = store
                    .upsert_player(PlayerCore::example(name, country))
                    .await
                    .unwrap();
                let mut candidate = CandidateCore::example(year, name, country, club);
                candidate.player_id = player.id;
                store.add_candidate(candidate).await.unwrap();
            }
            store
        }

        /// The candidates of the latest year, sorted by player name.
        pub fn latest_slate(&self) -> Vec<Candidate> {
            let latest = self.lock().candidates.iter().map(|c| c.year).max();
            latest.map(|year| self.slate(year)).unwrap_or_default()
        }

        /// The stored candidates of a year, sorted by player name.
        pub fn slate(&self, year: Year) -> Vec<Candidate> {
            let mut slate: Vec<_> = self
                .lock()
                .candidates
                .iter()
                .filter(|c| c.year == year)
                .cloned()
                .collect();
            slate.sort_by(|a, b| a.player_name.cmp(&b.player_name));
            slate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        common::ballot::Picks,
        db::{BallotCore, CandidateCore},
    };

    fn picks() -> Picks {
        Picks::new(Id::new(), Id::new(), Id::new())
    }

    #[rocket::async_test]
    async fn one_ballot_per_email_and_year() {
        let store = MemoryStore::new();
        store
            .insert_ballot(BallotCore::example(2025, picks()))
            .await
            .unwrap();

        let duplicate = store
            .insert_ballot(BallotCore::example(2025, picks()))
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));

        // A different year is a different identity.
        store
            .insert_ballot(BallotCore::example(2026, picks()))
            .await
            .unwrap();
        assert_eq!(store.ballot_count(), 2);
    }

    #[rocket::async_test]
    async fn verification_is_single_use() {
        let store = MemoryStore::new();
        let ballot = store
            .insert_ballot(BallotCore::example(2025, picks()))
            .await
            .unwrap();
        let token = ballot.token().unwrap().clone();

        let found = store.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(found.id, ballot.id);

        assert!(store.mark_verified(&found).await.unwrap());
        assert!(!store.mark_verified(&found).await.unwrap());
        assert_eq!(store.find_by_token(&token).await.unwrap(), None);

        let verified = store
            .find_verified_ballot(&ballot.email, 2025)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(verified.token(), None);
    }

    #[rocket::async_test]
    async fn verified_ballots_cannot_be_deleted() {
        let store = MemoryStore::new();
        let ballot = store
            .insert_ballot(BallotCore::example(2025, picks()))
            .await
            .unwrap();
        store.mark_verified(&ballot).await.unwrap();

        assert!(!store.delete_ballot(ballot.id).await.unwrap());
        assert_eq!(store.ballot_count(), 1);
    }

    #[rocket::async_test]
    async fn candidate_slugs_are_unique_per_year() {
        let store = MemoryStore::new();
        let first = store
            .add_candidate(CandidateCore::example(
                2025,
                "Rodri",
                "Spain",
                "Manchester City",
            ))
            .await
            .unwrap();
        let namesake = store
            .add_candidate(CandidateCore::example(2025, "Rodri", "Spain", "Real Betis"))
            .await
            .unwrap();
        let next_year = store
            .add_candidate(CandidateCore::example(
                2026,
                "Rodri",
                "Spain",
                "Manchester City",
            ))
            .await
            .unwrap();

        assert_eq!(first.slug, "rodri");
        assert_eq!(namesake.slug, "rodri-1");
        assert_eq!(next_year.slug, "rodri");
        assert_eq!(store.max_year_with_candidates().await.unwrap(), Some(2026));
        assert_eq!(
            store.candidate_by_slug(2025, "rodri-1").await.unwrap(),
            Some(namesake)
        );
    }

    #[rocket::async_test]
    async fn award_results_replace_by_rank_or_player() {
        let store = MemoryStore::new();
        let (rodri, vini) = (Id::new(), Id::new());
        let result = |rank, player_id, player_name: &str, points| NewAwardResult {
            year: 2024,
            rank,
            player_id,
            player_name: player_name.to_string(),
            club_at_award: String::new(),
            nationality_at_award: String::new(),
            points,
        };

        store
            .record_award_result(result(1, vini, "Vinícius Júnior", 1000))
            .await
            .unwrap();
        store
            .record_award_result(result(2, rodri, "Rodri", 900))
            .await
            .unwrap();
        // Correct the order: Rodri actually won.
        store
            .record_award_result(result(1, rodri, "Rodri", 1170))
            .await
            .unwrap();

        let (results, total) = store.award_results(0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(results[0].player_name, "Rodri");
        assert_eq!(results[0].points, 1170);
    }
}
