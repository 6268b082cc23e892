use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    award_result::{AwardResult, NewAwardResult},
    ballot::{Ballot, NewBallot},
    candidate::{Candidate, NewCandidate},
    player::{NewPlayer, Player},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Player collections
const PLAYERS: &str = "players";
impl MongoCollection for Player {
    const NAME: &'static str = PLAYERS;
}
impl MongoCollection for NewPlayer {
    const NAME: &'static str = PLAYERS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Ballot collections
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}
impl MongoCollection for NewBallot {
    const NAME: &'static str = BALLOTS;
}

// Award result collections
const AWARD_RESULTS: &str = "award_results";
impl MongoCollection for AwardResult {
    const NAME: &'static str = AWARD_RESULTS;
}
impl MongoCollection for NewAwardResult {
    const NAME: &'static str = AWARD_RESULTS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Player collection.
    let player_index = IndexModel::builder()
        .keys(doc! {"name": 1})
        .options(unique.clone())
        .build();
    Coll::<Player>::from_db(db)
        .create_index(player_index, None)
        .await?;

    // Candidate collection.
    let candidate_indexes = [
        doc! {"year": 1, "player_id": 1},
        doc! {"year": 1, "slug": 1},
    ]
    .into_iter()
    .map(|keys| {
        IndexModel::builder()
            .keys(keys)
            .options(unique.clone())
            .build()
    });
    Coll::<Candidate>::from_db(db)
        .create_indexes(candidate_indexes, None)
        .await?;

    // Ballot collection. One ballot per voter and year, whatever its state;
    // tokens only exist on pending ballots, hence sparse.
    let identity_index = IndexModel::builder()
        .keys(doc! {"email": 1, "year": 1})
        .options(unique.clone())
        .build();
    let token_index = IndexModel::builder()
        .keys(doc! {"token": 1})
        .options(IndexOptions::builder().unique(true).sparse(true).build())
        .build();
    let tally_index = IndexModel::builder()
        .keys(doc! {"year": 1, "state": 1})
        .build();
    Coll::<Ballot>::from_db(db)
        .create_indexes([identity_index, token_index, tally_index], None)
        .await?;

    // Award result collection.
    let result_indexes = [
        doc! {"year": 1, "rank": 1},
        doc! {"year": 1, "player_id": 1},
    ]
    .into_iter()
    .map(|keys| {
        IndexModel::builder()
            .keys(keys)
            .options(unique.clone())
            .build()
    });
    Coll::<AwardResult>::from_db(db)
        .create_indexes(result_indexes, None)
        .await?;

    Ok(())
}
