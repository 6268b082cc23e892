use chrono::Utc;
use rocket::{response::status::Accepted, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        candidate::CandidateSummary,
        voting::{PendingBallot, VerifiedBallot, VotingStatus},
    },
    common::ballot::VerificationToken,
};
use crate::notify::DynNotifier;
use crate::store::DynStore;
use crate::workflow::{
    active_year, deadline_for_year, BallotForm, BallotWorkflow, Redemption, Submission,
};

pub fn routes() -> Vec<Route> {
    routes![voting_status, submit_ballot, verify_ballot]
}

#[get("/vote")]
async fn voting_status(store: &State<DynStore>) -> Result<Json<VotingStatus>> {
    let store = store.inner().as_ref();
    let now = Utc::now();
    let year = active_year(store, now).await?;
    let deadline = deadline_for_year(year);

    let mut slate = store.candidates_for_year(year).await?;
    slate.sort_by(|a, b| a.player_name.cmp(&b.player_name));

    Ok(Json(VotingStatus {
        year,
        deadline,
        open: now <= deadline,
        candidates: slate.into_iter().map(CandidateSummary::from).collect(),
    }))
}

#[post("/vote", data = "<form>", format = "json")]
async fn submit_ballot(
    form: Json<BallotForm>,
    store: &State<DynStore>,
    notifier: &State<DynNotifier>,
    config: &State<Config>,
) -> Result<Accepted<Json<PendingBallot>>> {
    let workflow = BallotWorkflow::new(
        store.inner().as_ref(),
        notifier.inner().as_ref(),
        config.site_url(),
    );

    match workflow
        .submit_ballot(form.into_inner(), Utc::now())
        .await?
    {
        Submission::PendingVerification(id) => Ok(Accepted(Json(PendingBallot {
            ballot_id: id.into(),
            message: "Please check your email to confirm your vote!".to_string(),
        }))),
        Submission::Rejected(rejection) => Err(rejection.into()),
    }
}

#[get("/verify/<token>")]
async fn verify_ballot(
    token: VerificationToken,
    store: &State<DynStore>,
    notifier: &State<DynNotifier>,
    config: &State<Config>,
) -> Result<Json<VerifiedBallot>> {
    let workflow = BallotWorkflow::new(
        store.inner().as_ref(),
        notifier.inner().as_ref(),
        config.site_url(),
    );

    match workflow.redeem_token(&token).await? {
        Redemption::Verified(id) => Ok(Json(VerifiedBallot {
            ballot_id: id.into(),
            message: "Thank you, your vote has been counted!".to_string(),
        })),
        Redemption::Rejected(rejection) => Err(rejection.into()),
    }
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{serde_json, serde_json::json, Value},
    };

    use super::*;
    use crate::model::{common::email::Email, db::CandidateCore, mongodb::Id};
    use crate::notify::Outbox;
    use crate::store::{MemoryStore, ReferenceStore};

    /// Candidate IDs of the latest slate, sorted by player name.
    fn slate(store: &MemoryStore) -> Vec<Id> {
        store.latest_slate().iter().map(|c| c.id).collect()
    }

    fn ballot(picks: [Id; 3], email: &str) -> String {
        json!({
            "first": picks[0].to_string(),
            "second": picks[1].to_string(),
            "third": picks[2].to_string(),
            "email": email,
            "voter_name": "Test Voter",
        })
        .to_string()
    }

    async fn submit<'c>(client: &'c Client, body: String) -> LocalResponse<'c> {
        client
            .post(uri!(submit_ballot))
            .header(ContentType::JSON)
            .body(body)
            .dispatch()
            .await
    }

    async fn json_body(response: LocalResponse<'_>) -> Value {
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    fn last_token(outbox: &Outbox) -> String {
        let url = outbox.sent().last().unwrap().url.clone();
        url.rsplit('/').next().unwrap().to_string()
    }

    #[backend_test(seeded)]
    async fn voting_is_open(client: Client) {
        let response = client.get(uri!(voting_status)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let status = json_body(response).await;
        assert_eq!(status["open"], true);
        assert_eq!(status["candidates"].as_array().unwrap().len(), 5);
        assert_eq!(status["candidates"][0]["name"], "Lamine Yamal");
        assert!(status["deadline"]
            .as_str()
            .unwrap()
            .contains("-09-21T23:59:59"));
    }

    #[backend_test(seeded)]
    async fn vote_and_verify(client: Client, store: &MemoryStore, outbox: &Outbox) {
        let ids = slate(store);

        let response = submit(&client, ballot([ids[0], ids[1], ids[2]], "fan@example.com")).await;
        assert_eq!(Status::Accepted, response.status());
        let pending = json_body(response).await;

        let sent = outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, Email::example());
        assert!(sent[0].url.starts_with("https://fansaward.test/verify/"));

        let token = last_token(outbox);
        let response = client.get(format!("/verify/{token}")).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let verified = json_body(response).await;
        assert_eq!(verified["ballot_id"], pending["ballot_id"]);

        // The link only works once.
        let response = client.get(format!("/verify/{token}")).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        // And the voter can't vote again.
        let response = submit(&client, ballot([ids[2], ids[1], ids[0]], "fan@example.com")).await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(store.ballot_count(), 1);
    }

    #[backend_test(seeded)]
    async fn invalid_ballot(client: Client, store: &MemoryStore) {
        let ids = slate(store);

        let response = submit(&client, ballot([ids[0], ids[0], ids[1]], "not an email")).await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        let body = json_body(response).await;
        assert_eq!(body["status"], 422);
        assert!(body["fields"]["second"].is_array());
        assert!(body["fields"]["email"].is_array());
        assert_eq!(store.ballot_count(), 0);
    }

    #[backend_test(seeded)]
    async fn missing_fields(client: Client, store: &MemoryStore) {
        let ids = slate(store);
        let body = json!({
            "first": ids[0].to_string(),
            "second": ids[1].to_string(),
        })
        .to_string();

        let response = submit(&client, body).await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        let body = json_body(response).await;
        assert_eq!(body["fields"]["third"][0], "Select a candidate");
        assert!(body["fields"]["email"].is_array());
        assert!(body["fields"].get("first").is_none());
        assert_eq!(store.ballot_count(), 0);
    }

    #[backend_test(seeded)]
    async fn failed_email(client: Client, store: &MemoryStore, outbox: &Outbox) {
        let ids = slate(store);
        outbox.set_failing(true);

        let response = submit(&client, ballot([ids[0], ids[1], ids[2]], "fan@example.com")).await;
        assert_eq!(Status::ServiceUnavailable, response.status());
        assert_eq!(store.ballot_count(), 0);
    }

    #[backend_test]
    async fn voting_closed(client: Client, store: &MemoryStore) {
        // Only a long-past year has candidates.
        for (name, country, club) in [
            ("Michael Owen", "England", "Liverpool"),
            ("Raúl", "Spain", "Real Madrid"),
            ("Oliver Kahn", "Germany", "Bayern Munich"),
        ] {
            store
                .add_candidate(CandidateCore::example(2001, name, country, club))
                .await
                .unwrap();
        }
        let ids = slate(store);

        let response = client.get(uri!(voting_status)).dispatch().await;
        assert_eq!(json_body(response).await["open"], false);

        let response = submit(&client, ballot([ids[0], ids[1], ids[2]], "fan@example.com")).await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(store.ballot_count(), 0);
    }

    #[backend_test]
    async fn unknown_token(client: Client) {
        let response = client.get("/verify/made-up").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body = json_body(response).await;
        assert_eq!(body["message"], "Invalid or already verified link.");
    }
}
