use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core player data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCore {
    /// Unique display name.
    pub name: String,
    #[serde(default)]
    pub country: String,
    /// Current club, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
}

/// A player without an ID.
pub type NewPlayer = PlayerCore;

/// A player from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub player: PlayerCore,
}

impl Deref for Player {
    type Target = PlayerCore;

    fn deref(&self) -> &Self::Target {
        &self.player
    }
}

impl DerefMut for Player {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.player
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl PlayerCore {
        pub fn example(name: &str, country: &str) -> Self {
            Self {
                name: name.to_string(),
                country: country.to_string(),
                club: None,
            }
        }
    }
}
