use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::results::{Leaderboard, LiveResults},
    common::Year,
};
use crate::store::DynStore;
use crate::tally;
use crate::workflow::{self, active_year, deadline_for_year};

pub fn routes() -> Vec<Route> {
    routes![live_results, year_results]
}

#[get("/results/live")]
async fn live_results(
    store: &State<DynStore>,
    config: &State<Config>,
) -> Result<Json<LiveResults>> {
    let store = store.inner().as_ref();
    let now = Utc::now();
    let year = active_year(store, now).await?;

    let ballots = store.find_verified_ballots_for_year(year).await?;
    let standings = tally::compute_leaderboard(&ballots, config.leaderboard_size());
    let slate = store.candidates_for_year(year).await?;

    Ok(Json(LiveResults {
        leaderboard: Leaderboard::new(year, standings, &slate),
        total_votes: ballots.len(),
        deadline: deadline_for_year(year),
        last_updated: now,
    }))
}

#[get("/results/<year>?<limit>")]
async fn year_results(
    year: Year,
    limit: Option<usize>,
    store: &State<DynStore>,
    config: &State<Config>,
) -> Result<Json<Leaderboard>> {
    let store = store.inner().as_ref();
    let limit = limit.unwrap_or_else(|| config.leaderboard_size());
    let standings = workflow::leaderboard(store, year, limit).await?;
    let slate = store.candidates_for_year(year).await?;
    Ok(Json(Leaderboard::new(year, standings, &slate)))
}
