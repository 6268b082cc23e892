use std::collections::HashSet;

use mongodb::{
    bson::{doc, Bson},
    options::{FindOneOptions, FindOptions},
    results::InsertOneResult,
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        ballot::{VerificationToken, PENDING_VERIFICATION, VERIFIED},
        email::Email,
        Year,
    },
    db::{
        candidate::{slugify, unique_slug},
        AwardResult, Ballot, Candidate, NewAwardResult, NewBallot, NewCandidate, NewPlayer, Player,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{BallotRepository, CandidateProvider, ReferenceStore, ResultArchive};

/// The production store, backed by MongoDB. Uniqueness guarantees come from the
/// indexes created by [`crate::model::mongodb::ensure_indexes_exist`].
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn coll<T: crate::model::mongodb::MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }
}

/// Extract the ID the database assigned to a freshly inserted document.
fn inserted_id(result: InsertOneResult) -> Result<Id> {
    result
        .inserted_id
        .as_object_id()
        .map(Id::from)
        .ok_or_else(|| Error::internal("Database returned a non-ObjectId insertion ID"))
}

#[rocket::async_trait]
impl CandidateProvider for MongoStore {
    async fn candidates_for_year(&self, year: Year) -> Result<Vec<Candidate>> {
        let candidates = self
            .coll::<Candidate>()
            .find(doc! { "year": year }, None)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn max_year_with_candidates(&self) -> Result<Option<Year>> {
        let latest_first = FindOneOptions::builder().sort(doc! { "year": -1 }).build();
        let latest = self
            .coll::<Candidate>()
            .find_one(None, latest_first)
            .await?;
        Ok(latest.map(|candidate| candidate.year))
    }

    async fn candidate_by_slug(&self, year: Year, slug: &str) -> Result<Option<Candidate>> {
        let filter = doc! {
            "year": year,
            "slug": slug,
        };
        Ok(self.coll::<Candidate>().find_one(filter, None).await?)
    }
}

#[rocket::async_trait]
impl BallotRepository for MongoStore {
    async fn find_ballot(&self, email: &Email, year: Year) -> Result<Option<Ballot>> {
        let filter = doc! {
            "email": email.as_str(),
            "year": year,
        };
        Ok(self.coll::<Ballot>().find_one(filter, None).await?)
    }

    async fn find_verified_ballot(&self, email: &Email, year: Year) -> Result<Option<Ballot>> {
        let filter = doc! {
            "email": email.as_str(),
            "year": year,
            "state": VERIFIED,
        };
        Ok(self.coll::<Ballot>().find_one(filter, None).await?)
    }

    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Ballot> {
        match self.coll::<NewBallot>().insert_one(&ballot, None).await {
            Ok(result) => Ok(Ballot {
                id: inserted_id(result)?,
                ballot,
            }),
            Err(err) if is_duplicate_key_error(&err) => Err(Error::Conflict(format!(
                "Ballot for {} in {} already exists",
                ballot.email, ballot.year
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_ballot(&self, id: Id) -> Result<bool> {
        let still_pending = doc! {
            "_id": id,
            "state": PENDING_VERIFICATION,
        };
        let result = self
            .coll::<Ballot>()
            .delete_one(still_pending, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn find_verified_ballots_for_year(&self, year: Year) -> Result<Vec<Ballot>> {
        let filter = doc! {
            "year": year,
            "state": VERIFIED,
        };
        let ballots = self
            .coll::<Ballot>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(ballots)
    }

    async fn find_by_token(&self, token: &VerificationToken) -> Result<Option<Ballot>> {
        let filter = doc! {
            "token": token.as_str(),
            "state": PENDING_VERIFICATION,
        };
        Ok(self.coll::<Ballot>().find_one(filter, None).await?)
    }

    async fn mark_verified(&self, ballot: &Ballot) -> Result<bool> {
        let Some(token) = ballot.token() else {
            return Ok(false);
        };
        // Matching on the token makes concurrent redemptions race on a single
        // document update; only one of them can modify it.
        let filter = doc! {
            "_id": ballot.id,
            "state": PENDING_VERIFICATION,
            "token": token.as_str(),
        };
        let update = doc! {
            "$set": { "state": VERIFIED },
            "$unset": { "token": "" },
        };
        let result = self
            .coll::<Ballot>()
            .update_one(filter, update, None)
            .await?;
        Ok(result.modified_count == 1)
    }
}

#[rocket::async_trait]
impl ResultArchive for MongoStore {
    async fn award_results(&self, skip: u64, limit: u64) -> Result<(Vec<AwardResult>, u64)> {
        let options = FindOptions::builder()
            .sort(doc! { "year": -1, "rank": 1 })
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let results = self.coll::<AwardResult>();
        let page = results.find(None, options).await?.try_collect().await?;
        let total = results.count_documents(None, None).await?;
        Ok((page, total))
    }
}

#[rocket::async_trait]
impl ReferenceStore for MongoStore {
    async fn upsert_player(&self, player: NewPlayer) -> Result<Player> {
        let players = self.coll::<Player>();
        let with_name = doc! { "name": &player.name };
        if let Some(existing) = players.find_one(with_name.clone(), None).await? {
            return Ok(existing);
        }

        match self.coll::<NewPlayer>().insert_one(&player, None).await {
            Ok(result) => Ok(Player {
                id: inserted_id(result)?,
                player,
            }),
            // Someone else created the player in the meantime.
            Err(err) if is_duplicate_key_error(&err) => players
                .find_one(with_name, None)
                .await?
                .ok_or_else(|| Error::internal(format!("Player {} vanished", player.name))),
            Err(err) => Err(err.into()),
        }
    }

    async fn add_candidate(&self, mut candidate: NewCandidate) -> Result<Candidate> {
        let candidates = self.coll::<Candidate>();
        let existing = doc! {
            "year": candidate.year,
            "player_id": candidate.player_id,
        };
        if candidates.find_one(existing, None).await?.is_some() {
            return Err(Error::Conflict(format!(
                "{} is already a candidate in {}",
                candidate.player_name, candidate.year
            )));
        }

        let taken = candidates
            .distinct("slug", doc! { "year": candidate.year }, None)
            .await?
            .into_iter()
            .filter_map(|slug| match slug {
                Bson::String(slug) => Some(slug),
                _ => None,
            })
            .collect::<HashSet<_>>();
        let base = if candidate.slug.is_empty() {
            slugify(&candidate.player_name)
        } else {
            candidate.slug.clone()
        };
        candidate.slug = unique_slug(&base, |slug| taken.contains(slug));

        match self
            .coll::<NewCandidate>()
            .insert_one(&candidate, None)
            .await
        {
            Ok(result) => Ok(Candidate {
                id: inserted_id(result)?,
                candidate,
            }),
            Err(err) if is_duplicate_key_error(&err) => Err(Error::Conflict(format!(
                "Candidate slug {} is already taken in {}",
                candidate.slug, candidate.year
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn record_award_result(&self, result: NewAwardResult) -> Result<AwardResult> {
        let results = self.coll::<AwardResult>();
        let clashing = doc! {
            "year": result.year,
            "$or": [
                { "rank": i64::from(result.rank) },
                { "player_id": result.player_id },
            ],
        };

        let Some(existing) = results.find_one(clashing.clone(), None).await? else {
            let inserted = self
                .coll::<NewAwardResult>()
                .insert_one(&result, None)
                .await?;
            return Ok(AwardResult {
                id: inserted_id(inserted)?,
                result,
            });
        };

        // Replacing by rank can leave a stale record for the same player elsewhere.
        let mut others = clashing;
        others.insert("_id", doc! { "$ne": existing.id });
        results.delete_many(others, None).await?;
        self.coll::<NewAwardResult>()
            .replace_one(existing.id.as_doc(), &result, None)
            .await?;
        Ok(AwardResult {
            id: existing.id,
            result,
        })
    }
}
