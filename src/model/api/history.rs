use serde::{Deserialize, Serialize};

use super::id::ApiId;
use crate::model::{common::Year, db::AwardResult};

/// One historical Ballon d'Or placing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardResultDesc {
    pub id: ApiId,
    pub year: Year,
    pub rank: u32,
    pub player_id: ApiId,
    pub player_name: String,
    pub club: String,
    pub nationality: String,
    pub points: u32,
}

impl From<AwardResult> for AwardResultDesc {
    fn from(result: AwardResult) -> Self {
        Self {
            id: result.id.into(),
            year: result.result.year,
            rank: result.result.rank,
            player_id: result.result.player_id.into(),
            player_name: result.result.player_name,
            club: result.result.club_at_award,
            nationality: result.result.nationality_at_award,
            points: result.result.points,
        }
    }
}
