use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::Year, mongodb::Id};

/// A finalised result from a past award year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardResultCore {
    pub year: Year,
    /// Final position; unique within the year.
    pub rank: u32,
    /// Foreign Key player ID; unique within the year.
    pub player_id: Id,
    pub player_name: String,
    #[serde(default)]
    pub club_at_award: String,
    #[serde(default)]
    pub nationality_at_award: String,
    pub points: u32,
}

/// An award result without an ID.
pub type NewAwardResult = AwardResultCore;

/// An award result from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardResult {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub result: AwardResultCore,
}

impl Deref for AwardResult {
    type Target = AwardResultCore;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

impl DerefMut for AwardResult {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.result
    }
}
