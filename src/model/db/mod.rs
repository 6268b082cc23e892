//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod award_result;
pub mod ballot;
pub mod candidate;
pub mod player;

pub use award_result::{AwardResult, AwardResultCore, NewAwardResult};
pub use ballot::{Ballot, BallotCore, NewBallot};
pub use candidate::{Candidate, CandidateCore, CandidateProfile, NewCandidate};
pub use player::{NewPlayer, Player, PlayerCore};
