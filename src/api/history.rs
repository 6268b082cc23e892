use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::api::{
    history::AwardResultDesc,
    pagination::{Paginated, PaginationRequest},
};
use crate::store::DynStore;

pub fn routes() -> Vec<Route> {
    routes![history]
}

/// Official results of past years, newest year first.
#[get("/history?<pagination..>")]
async fn history(
    pagination: PaginationRequest,
    store: &State<DynStore>,
) -> Result<Json<Paginated<AwardResultDesc>>> {
    let (results, total) = store
        .award_results(pagination.skip(), pagination.page_size())
        .await?;
    let results = results.into_iter().map(Into::into).collect();
    Ok(Json(pagination.to_paginated(total, results)))
}
