use std::collections::BTreeSet;

use chrono::Utc;
use rand::seq::SliceRandom;
use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::candidate::{CandidateDetail, CandidateFilter, CandidateListing, VotingStats},
    common::Year,
};
use crate::store::DynStore;
use crate::tally;
use crate::workflow::active_year;

/// How many other candidates a candidate's page links to.
const OTHER_CANDIDATES: usize = 5;

pub fn routes() -> Vec<Route> {
    routes![candidates, candidate_detail]
}

#[get("/candidates?<filter..>")]
async fn candidates(
    filter: CandidateFilter,
    store: &State<DynStore>,
) -> Result<Json<CandidateListing>> {
    let store = store.inner().as_ref();
    let year = active_year(store, Utc::now()).await?;

    let mut slate = store.candidates_for_year(year).await?;
    slate.sort_by(|a, b| a.player_name.cmp(&b.player_name));

    // Filter options always cover the whole slate.
    let clubs = slate
        .iter()
        .filter_map(|candidate| candidate.club.clone())
        .filter(|club| !club.is_empty())
        .collect::<BTreeSet<_>>();
    let countries = slate
        .iter()
        .map(|candidate| candidate.country.clone())
        .filter(|country| !country.is_empty())
        .collect::<BTreeSet<_>>();

    let candidates = slate
        .into_iter()
        .filter(|candidate| filter.matches(candidate))
        .map(Into::into)
        .collect();

    Ok(Json(CandidateListing {
        year,
        candidates,
        clubs: clubs.into_iter().collect(),
        countries: countries.into_iter().collect(),
    }))
}

#[get("/candidates/<year>/<slug>")]
async fn candidate_detail(
    year: Year,
    slug: &str,
    store: &State<DynStore>,
) -> Result<Json<CandidateDetail>> {
    let store = store.inner().as_ref();
    let candidate = store
        .candidate_by_slug(year, slug)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate '{slug}' in {year}")))?;

    let ballots = store.find_verified_ballots_for_year(year).await?;
    let voting_stats = VotingStats::new(
        tally::vote_breakdown(candidate.id, &ballots),
        tally::rank_of(candidate.id, &ballots),
    );

    let others = store
        .candidates_for_year(year)
        .await?
        .into_iter()
        .filter(|other| other.id != candidate.id)
        .collect::<Vec<_>>();
    let other_candidates = others
        .choose_multiple(&mut rand::thread_rng(), OTHER_CANDIDATES)
        .cloned()
        .map(Into::into)
        .collect();

    let profile = candidate.profile.clone();
    Ok(Json(CandidateDetail {
        summary: candidate.into(),
        profile,
        voting_stats,
        other_candidates,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::Status,
        local::asynchronous::Client,
        serde::json::{serde_json, Value},
    };

    use super::*;
    use crate::model::{
        common::ballot::Picks,
        db::{BallotCore, CandidateCore},
    };
    use crate::store::{BallotRepository, MemoryStore, ReferenceStore};

    async fn get_json(client: &Client, uri: &str) -> (Status, Value) {
        let response = client.get(uri).dispatch().await;
        let status = response.status();
        let body = response.into_string().await.unwrap();
        (status, serde_json::from_str(&body).unwrap())
    }

    #[backend_test(seeded)]
    async fn list_candidates(client: Client) {
        let (status, listing) = get_json(&client, "/candidates").await;
        assert_eq!(Status::Ok, status);

        let names: Vec<_> = listing["candidates"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "Lamine Yamal",
                "Mohamed Salah",
                "Ousmane Dembélé",
                "Raphinha",
                "Vitinha"
            ]
        );
        assert_eq!(
            listing["clubs"],
            serde_json::json!(["Barcelona", "Liverpool", "Paris Saint-Germain"])
        );
        assert_eq!(listing["countries"].as_array().unwrap().len(), 5);
    }

    #[backend_test(seeded)]
    async fn filter_candidates(client: Client) {
        let (_, listing) = get_json(&client, "/candidates?club=Barcelona&search=yam").await;
        let candidates = listing["candidates"].as_array().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0]["slug"], "lamine-yamal");
        // Filter options are not narrowed down.
        assert_eq!(listing["clubs"].as_array().unwrap().len(), 3);

        let (_, listing) = get_json(&client, "/candidates?country=France").await;
        let candidates = listing["candidates"].as_array().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0]["name"], "Ousmane Dembélé");
    }

    #[backend_test]
    async fn no_candidates_at_all(client: Client) {
        let (status, listing) = get_json(&client, "/candidates").await;
        assert_eq!(Status::Ok, status);
        assert_eq!(listing["candidates"], serde_json::json!([]));
    }

    #[backend_test]
    async fn candidate_page(client: Client, store: &MemoryStore) {
        let year = 2025;
        let mut ids = Vec::new();
        for (name, country, club) in [
            ("Ousmane Dembélé", "France", "Paris Saint-Germain"),
            ("Lamine Yamal", "Spain", "Barcelona"),
            ("Vitinha", "Portugal", "Paris Saint-Germain"),
        ] {
            let mut candidate = CandidateCore::example(year, name, country, club);
            candidate.profile.goals = 35;
            ids.push(store.add_candidate(candidate).await.unwrap().id);
        }
        for picks in [
            Picks::new(ids[0], ids[1], ids[2]),
            Picks::new(ids[1], ids[0], ids[2]),
        ] {
            let mut ballot = BallotCore::example(year, picks);
            ballot.email = format!("fan{}@example.com", picks.first).parse().unwrap();
            let ballot = store.insert_ballot(ballot).await.unwrap();
            assert!(store.mark_verified(&ballot).await.unwrap());
        }

        let uri = uri!(candidate_detail(year, "ousmane-dembele")).to_string();
        let (status, detail) = get_json(&client, &uri).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(detail["name"], "Ousmane Dembélé");
        assert_eq!(detail["goals"], 35);
        assert_eq!(
            detail["voting_stats"],
            serde_json::json!({
                "first_votes": 1,
                "second_votes": 1,
                "third_votes": 0,
                "total_points": 8,
                "current_rank": 1,
            })
        );
        assert_eq!(detail["other_candidates"].as_array().unwrap().len(), 2);

        let (_, detail) = get_json(&client, "/candidates/2025/vitinha").await;
        assert_eq!(detail["voting_stats"]["total_points"], 2);
        assert_eq!(detail["voting_stats"]["current_rank"], 2);
    }

    #[backend_test]
    async fn unknown_candidate(client: Client) {
        let (status, body) = get_json(&client, "/candidates/2025/nobody").await;
        assert_eq!(Status::NotFound, status);
        assert_eq!(body["status"], 404);
    }
}
