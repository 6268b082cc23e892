use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        ballot::{BallotState, Picks, VerificationToken, VoterInfo},
        email::Email,
        Year,
    },
    mongodb::Id,
};

/// Core ballot data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCore {
    /// The award year this ballot counts towards.
    pub year: Year,
    /// The voter's identity; at most one ballot exists per email and year.
    pub email: Email,
    /// The ranked top-3.
    #[serde(flatten)]
    pub picks: Picks,
    /// Optional voter details.
    #[serde(flatten)]
    pub voter: VoterInfo,
    /// Ballot creation time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Pending with a token, or verified.
    #[serde(flatten)]
    pub state: BallotState,
}

impl BallotCore {
    /// Create a new ballot awaiting verification, with a fresh token.
    pub fn new(
        year: Year,
        email: Email,
        picks: Picks,
        voter: VoterInfo,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            year,
            email,
            picks,
            voter,
            created_at,
            state: BallotState::pending(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.state.is_verified()
    }

    pub fn token(&self) -> Option<&VerificationToken> {
        self.state.token()
    }
}

/// A ballot without an ID.
pub type NewBallot = BallotCore;

/// A ballot from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Ballot {
    /// The same ballot, after its token has been redeemed.
    pub fn into_verified(mut self) -> Self {
        self.ballot.state = BallotState::Verified;
        self
    }
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}

impl DerefMut for Ballot {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ballot
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl BallotCore {
        pub fn example(year: Year, picks: Picks) -> Self {
            Self::new(
                year,
                Email::example(),
                picks,
                VoterInfo {
                    voter_name: Some("Test Voter".to_string()),
                    voter_country: Some("Testland".to_string()),
                },
                Utc::now(),
            )
        }
    }

    impl Ballot {
        /// A verified ballot with a fresh ID, as the tally sees them.
        pub fn verified_example(year: Year, picks: Picks) -> Self {
            Self {
                id: Id::new(),
                ballot: BallotCore::example(year, picks),
            }
            .into_verified()
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{from_document, to_document};

    use super::*;
    use crate::model::common::ballot::{PENDING_VERIFICATION, VERIFIED};

    #[test]
    fn ballot_document_layout() {
        let picks = Picks::new(Id::new(), Id::new(), Id::new());
        let ballot = Ballot {
            id: Id::new(),
            ballot: BallotCore::example(2025, picks),
        };
        let token = ballot.token().unwrap().clone();

        let document = to_document(&ballot).unwrap();
        assert_eq!(document.get_i32("year").unwrap(), 2025);
        assert_eq!(document.get_str("email").unwrap(), "fan@example.com");
        assert_eq!(document.get_object_id("first").unwrap(), *picks.first);
        assert_eq!(document.get_str("state").unwrap(), PENDING_VERIFICATION);
        assert_eq!(document.get_str("token").unwrap(), token.as_str());
        assert!(document.get_datetime("created_at").is_ok());

        let verified = to_document(&ballot.clone().into_verified()).unwrap();
        assert_eq!(verified.get_str("state").unwrap(), VERIFIED);
        assert!(!verified.contains_key("token"));

        let decoded: Ballot = from_document(verified).unwrap();
        assert!(decoded.is_verified());
        assert_eq!(decoded.picks, picks);
        assert_eq!(decoded.id, ballot.id);
    }
}
