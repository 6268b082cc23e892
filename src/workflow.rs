//! Ballot acceptance and verification.
//!
//! A voter is identified by their email address. Each (email, year) moves
//! through a small state machine:
//!
//! - no ballot --submit--> pending verification (token emailed)
//! - pending --submit--> pending (old ballot replaced, new token emailed)
//! - pending --redeem token--> verified
//! - verified --submit--> rejected as already voted
//!
//! Only verified ballots are counted by the [`crate::tally`].

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use log::{debug, error, info, warn};
use rocket::http::Status;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        ballot::{Picks, VerificationToken, VoterInfo},
        email::Email,
        Year,
    },
    db::{Candidate, NewBallot},
    mongodb::Id,
};
use crate::notify::Notifier;
use crate::store::{BallotRepository, CandidateProvider, Store};
use crate::tally::{self, Rank, Standing};

/// Longest accepted voter name or country.
pub const MAX_VOTER_FIELD_LENGTH: usize = 100;

const PICK_FIELDS: [&str; 3] = ["first", "second", "third"];

/// Validation messages, keyed by form field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

/// Why a submission or verification was turned down. These are ordinary
/// outcomes reported back to the voter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("The ballot is invalid")]
    Validation(FieldErrors),
    #[error("Voting has closed. Thank you for your interest!")]
    VotingClosed,
    #[error("You have already voted. Thank you!")]
    AlreadyVoted,
    #[error("Error sending verification email. Please try again.")]
    NotificationFailed,
    #[error("Another submission for this email is in progress. Please try again.")]
    Conflict,
    #[error("Invalid or already verified link.")]
    InvalidToken,
}

impl Rejection {
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::UnprocessableEntity,
            Self::VotingClosed => Status::Forbidden,
            Self::AlreadyVoted | Self::Conflict => Status::Conflict,
            Self::NotificationFailed => Status::ServiceUnavailable,
            Self::InvalidToken => Status::NotFound,
        }
    }
}

/// Outcome of [`BallotWorkflow::submit_ballot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Stored and awaiting verification.
    PendingVerification(Id),
    Rejected(Rejection),
}

/// Outcome of [`BallotWorkflow::redeem_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    Verified(Id),
    Rejected(Rejection),
}

/// A ballot as submitted by a voter, before validation. Missing fields are
/// left empty so that [`validate`] reports them per field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BallotForm {
    pub first: String,
    pub second: String,
    pub third: String,
    pub email: String,
    pub voter_name: Option<String>,
    pub voter_country: Option<String>,
}

/// The moment voting closes for the given year: 21 September, 23:59:59 UTC.
pub fn deadline_for_year(year: Year) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, 9, 21)
        .and_then(|day| day.and_hms_opt(23, 59, 59))
        .map(|deadline| Utc.from_utc_datetime(&deadline))
        // Years beyond chrono's range never close.
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The latest year with candidates, or the current calendar year if there are
/// no candidates at all.
pub async fn active_year<P>(candidates: &P, now: DateTime<Utc>) -> Result<Year>
where
    P: CandidateProvider + ?Sized,
{
    Ok(candidates
        .max_year_with_candidates()
        .await?
        .unwrap_or_else(|| now.year()))
}

/// The link emailed to voters.
pub fn verification_url(site_url: &str, token: &VerificationToken) -> String {
    format!("{}/verify/{token}", site_url.trim_end_matches('/'))
}

/// Check a form against the slate of the given year.
pub fn validate(
    form: &BallotForm,
    slate: &[Candidate],
    year: Year,
) -> std::result::Result<(Picks, Email, VoterInfo), FieldErrors> {
    let mut errors = FieldErrors::default();

    let mut picks = [None; 3];
    for (pick, (field, raw)) in
        picks.iter_mut().zip(
            PICK_FIELDS
                .into_iter()
                .zip([&form.first, &form.second, &form.third]),
        )
    {
        match raw.trim().parse::<Id>() {
            Ok(id) => *pick = Some(id),
            Err(_) => errors.add(field, "Select a candidate"),
        }
    }

    for later in 1..picks.len() {
        if picks[later].is_some() && picks[..later].contains(&picks[later]) {
            errors.add(PICK_FIELDS[later], "Each candidate can only be picked once");
        }
    }

    for (field, pick) in PICK_FIELDS.into_iter().zip(picks) {
        if let Some(id) = pick {
            if !slate.iter().any(|candidate| candidate.id == id) {
                errors.add(field, format!("Not a candidate for {year}"));
            }
        }
    }

    let email = match form.email.parse::<Email>() {
        Ok(email) => Some(email),
        Err(err) => {
            errors.add("email", err.to_string());
            None
        }
    };

    let mut optional = |field: &str, value: &Option<String>| {
        let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        if value.chars().count() > MAX_VOTER_FIELD_LENGTH {
            errors.add(
                field,
                format!("Must be at most {MAX_VOTER_FIELD_LENGTH} characters"),
            );
        }
        Some(value.to_string())
    };
    let voter = VoterInfo {
        voter_name: optional("voter_name", &form.voter_name),
        voter_country: optional("voter_country", &form.voter_country),
    };

    match (picks, email) {
        ([Some(first), Some(second), Some(third)], Some(email)) if errors.is_empty() => {
            Ok((Picks::new(first, second, third), email, voter))
        }
        _ => Err(errors),
    }
}

/// Entry points of the voting process.
pub struct BallotWorkflow<'a> {
    store: &'a dyn Store,
    notifier: &'a dyn Notifier,
    site_url: &'a str,
}

impl<'a> BallotWorkflow<'a> {
    /// `site_url` is the public base URL verification links point to.
    pub fn new(store: &'a dyn Store, notifier: &'a dyn Notifier, site_url: &'a str) -> Self {
        Self {
            store,
            notifier,
            site_url,
        }
    }

    pub async fn submit_ballot(&self, form: BallotForm, now: DateTime<Utc>) -> Result<Submission> {
        let year = active_year(self.store, now).await?;
        if now > deadline_for_year(year) {
            warn!("Rejected ballot: voting for {year} has closed");
            return Ok(Submission::Rejected(Rejection::VotingClosed));
        }

        let slate = self.store.candidates_for_year(year).await?;
        let (picks, email, voter) = match validate(&form, &slate, year) {
            Ok(valid) => valid,
            Err(fields) => {
                warn!("Rejected invalid ballot: {fields:?}");
                return Ok(Submission::Rejected(Rejection::Validation(fields)));
            }
        };

        if let Some(existing) = self.store.find_ballot(&email, year).await? {
            if existing.is_verified() {
                warn!("Rejected ballot: {email} already voted in {year}");
                return Ok(Submission::Rejected(Rejection::AlreadyVoted));
            }
            // The old ballot may have been verified or replaced meanwhile.
            if self.store.delete_ballot(existing.id).await? {
                debug!("Replaced pending ballot {} of {email}", existing.id);
            } else if self
                .store
                .find_verified_ballot(&email, year)
                .await?
                .is_some()
            {
                warn!("Rejected ballot: {email} already voted in {year}");
                return Ok(Submission::Rejected(Rejection::AlreadyVoted));
            }
        }

        let ballot = match self
            .store
            .insert_ballot(NewBallot::new(year, email.clone(), picks, voter, now))
            .await
        {
            Ok(ballot) => ballot,
            Err(Error::Conflict(reason)) => {
                warn!("Concurrent submission: {reason}");
                let rejection = match self.store.find_verified_ballot(&email, year).await? {
                    Some(_) => Rejection::AlreadyVoted,
                    None => Rejection::Conflict,
                };
                return Ok(Submission::Rejected(rejection));
            }
            Err(err) => return Err(err),
        };

        let token = ballot
            .token()
            .ok_or_else(|| Error::internal(format!("New ballot {} has no token", ballot.id)))?;
        let url = verification_url(self.site_url, token);
        if let Err(err) = self
            .notifier
            .send_verification_email(&ballot.email, &url)
            .await
        {
            error!("Could not notify {}: {err}", ballot.email);
            self.store.delete_ballot(ballot.id).await?;
            return Ok(Submission::Rejected(Rejection::NotificationFailed));
        }

        info!("Ballot {} for {year} awaiting verification", ballot.id);
        Ok(Submission::PendingVerification(ballot.id))
    }

    pub async fn redeem_token(&self, token: &VerificationToken) -> Result<Redemption> {
        let Some(ballot) = self.store.find_by_token(token).await? else {
            warn!("Unknown or used verification token");
            return Ok(Redemption::Rejected(Rejection::InvalidToken));
        };

        if !self.store.mark_verified(&ballot).await? {
            warn!("Ballot {} was verified concurrently", ballot.id);
            return Ok(Redemption::Rejected(Rejection::InvalidToken));
        }

        info!("Ballot {} for {} verified", ballot.id, ballot.year);
        Ok(Redemption::Verified(ballot.id))
    }
}

/// The top `limit` candidates of a year, counting verified ballots only.
pub async fn leaderboard<R>(ballots: &R, year: Year, limit: usize) -> Result<Vec<Standing>>
where
    R: BallotRepository + ?Sized,
{
    let ballots = ballots.find_verified_ballots_for_year(year).await?;
    Ok(tally::compute_leaderboard(&ballots, limit))
}

/// Where a candidate currently stands in a year's vote.
pub async fn rank_of<R>(ballots: &R, candidate: Id, year: Year) -> Result<Rank>
where
    R: BallotRepository + ?Sized,
{
    let ballots = ballots.find_verified_ballots_for_year(year).await?;
    Ok(tally::rank_of(candidate, &ballots))
}
