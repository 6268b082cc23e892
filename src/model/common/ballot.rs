use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use data_encoding::BASE64URL_NOPAD;
use rand::RngCore;
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Number of random bytes in a verification token.
pub const TOKEN_BYTES: usize = 32;

/// Stored value of the `state` field for ballots awaiting verification.
pub const PENDING_VERIFICATION: &str = "PendingVerification";

/// Stored value of the `state` field for verified ballots.
pub const VERIFIED: &str = "Verified";

/// The three ranked choices on a ballot, as candidate IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Picks {
    pub first: Id,
    pub second: Id,
    pub third: Id,
}

/// Where a candidate was placed on a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    First,
    Second,
    Third,
}

impl Picks {
    pub fn new(first: Id, second: Id, third: Id) -> Self {
        Self {
            first,
            second,
            third,
        }
    }

    /// The picks in ballot order, paired with their placement.
    pub fn placements(&self) -> [(Placement, Id); 3] {
        [
            (Placement::First, self.first),
            (Placement::Second, self.second),
            (Placement::Third, self.third),
        ]
    }

    /// Are the three picks pairwise distinct?
    pub fn is_distinct(&self) -> bool {
        self.first != self.second && self.first != self.third && self.second != self.third
    }

    /// Where the given candidate was placed, if at all.
    pub fn placement_of(&self, candidate: Id) -> Option<Placement> {
        self.placements()
            .into_iter()
            .find(|(_, id)| *id == candidate)
            .map(|(placement, _)| placement)
    }
}

/// A single-use secret emailed to the voter to confirm their ballot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Generate a fresh random token.
    pub fn random() -> Self {
        let mut bytes = [0_u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(BASE64URL_NOPAD.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VerificationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Any string is accepted; unknown tokens are simply never found.
impl FromStr for VerificationToken {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl<'a> FromParam<'a> for VerificationToken {
    type Error = Infallible;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

/// Verification state of a ballot. The token only exists while the ballot
/// is pending, and is gone for good once it has been redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum BallotState {
    PendingVerification { token: VerificationToken },
    Verified,
}

impl BallotState {
    /// A pending state with a freshly generated token.
    pub fn pending() -> Self {
        Self::PendingVerification {
            token: VerificationToken::random(),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    pub fn token(&self) -> Option<&VerificationToken> {
        match self {
            Self::PendingVerification { token } => Some(token),
            Self::Verified => None,
        }
    }
}

/// Optional details a voter may share alongside their ballot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_country: Option<String>,
}
