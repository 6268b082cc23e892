//! A CLI tool for loading reference data into the FansAward database:
//! players, the candidates of each award year, and official results of past
//! years. Importing the same file twice updates rather than duplicates.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use mongodb::Client as MongoClient;
use rocket::serde::json::serde_json;
use serde::Deserialize;

use fansaward_backend::{
    error::Error as StoreError,
    model::{
        common::Year,
        db::{AwardResultCore, CandidateCore, CandidateProfile, Player, PlayerCore},
        mongodb::ensure_indexes_exist,
    },
    store::{MongoStore, ReferenceStore},
};

const PROGRAM_NAME: &str = "import-fansaward";

const ABOUT_TEXT: &str = "Import players, candidates and historical results into FansAward.

EXIT CODES:
     0: Import succeeded.
     1: Error.";

const DATA_PATH: &str = "DATA_PATH";
const DB_URI: &str = "DB_URI";
const DB_NAME: &str = "DB_NAME";

const DATA_PATH_HELP: &str = "The path to a JSON file with `players`, `candidates`\n\
and `results` arrays, all optional";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DATA_PATH)
                .help(DATA_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(DB_URI)
                .long("db-uri")
                .help("MongoDB connection string")
                .action(ArgAction::Set)
                .default_value("mongodb://localhost:27017"),
        )
        .arg(
            Arg::new(DB_NAME)
                .long("db-name")
                .help("Database to import into")
                .action(ArgAction::Set)
                .default_value("fansaward"),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON file.
    Format(String),
    /// The file refers to something it doesn't define.
    Data(String),
    /// The database rejected an operation.
    Store(StoreError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IO(msg) => write!(f, "IO error: {msg}"),
            Self::Format(msg) => write!(f, "Invalid JSON: {msg}"),
            Self::Data(msg) => write!(f, "Invalid data: {msg}"),
            Self::Store(err) => write!(f, "Database error: {err}"),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Store(err.into())
    }
}

/// The whole import file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImportData {
    players: Vec<PlayerEntry>,
    candidates: Vec<CandidateEntry>,
    results: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct PlayerEntry {
    name: String,
    country: String,
    #[serde(default)]
    club: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateEntry {
    year: Year,
    /// Player name.
    player: String,
    /// Needed only if the player isn't listed under `players`.
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    club: Option<String>,
    /// Derived from the player name if absent.
    #[serde(default)]
    slug: Option<String>,
    #[serde(flatten)]
    profile: CandidateProfile,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    year: Year,
    rank: RankEntry,
    player: String,
    club: String,
    #[serde(default)]
    nationality: Option<String>,
    #[serde(default)]
    points: Option<f64>,
}

/// A rank, either a number or an ordinal such as `"1st"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RankEntry {
    Number(u32),
    Text(String),
}

impl RankEntry {
    fn parse(&self) -> Option<u32> {
        match self {
            Self::Number(rank) => Some(*rank),
            Self::Text(text) => {
                let text = text.trim();
                let digits = ["st", "nd", "rd", "th"]
                    .iter()
                    .find_map(|suffix| text.strip_suffix(suffix))
                    .unwrap_or(text);
                digits.parse().ok()
            }
        }
        .filter(|rank| *rank > 0)
    }
}

/// What an import did.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    players: usize,
    candidates: usize,
    results: usize,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} player{}, {} candidate{}, {} result{}",
            self.players,
            if self.players != 1 { "s" } else { "" },
            self.candidates,
            if self.candidates != 1 { "s" } else { "" },
            self.results,
            if self.results != 1 { "s" } else { "" },
        )
    }
}

/// Load and decode the import file.
fn load(path: &str) -> Result<ImportData, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))
}

/// Players seen so far, by name.
struct Players<'a, S: ?Sized> {
    store: &'a S,
    known: HashMap<String, Player>,
}

impl<'a, S: ReferenceStore + ?Sized> Players<'a, S> {
    fn new(store: &'a S) -> Self {
        Self {
            store,
            known: HashMap::new(),
        }
    }

    async fn upsert(&mut self, player: PlayerCore) -> Result<Player, Error> {
        let player = self.store.upsert_player(player).await?;
        self.known.insert(player.name.clone(), player.clone());
        Ok(player)
    }

    /// Find a player by name, creating them if a country is known.
    async fn resolve(&mut self, name: &str, country: Option<&str>) -> Result<Player, Error> {
        if let Some(player) = self.known.get(name) {
            return Ok(player.clone());
        }
        let country = country.ok_or_else(|| {
            Error::Data(format!("Player '{name}' is not listed and has no country"))
        })?;
        self.upsert(PlayerCore {
            name: name.to_string(),
            country: country.to_string(),
            club: None,
        })
        .await
    }
}

/// Import everything into the given store.
async fn import<S>(store: &S, data: ImportData) -> Result<Summary, Error>
where
    S: ReferenceStore + ?Sized,
{
    let mut summary = Summary::default();
    let mut players = Players::new(store);

    for entry in data.players {
        let player = players
            .upsert(PlayerCore {
                name: entry.name.trim().to_string(),
                country: entry.country.trim().to_string(),
                club: entry.club,
            })
            .await?;
        println!("Player: {}", player.name);
        summary.players += 1;
    }

    for entry in data.candidates {
        let name = entry.player.trim();
        let player = players.resolve(name, entry.country.as_deref()).await?;
        let added = store
            .add_candidate(CandidateCore {
                year: entry.year,
                player_id: player.id,
                player_name: player.name.clone(),
                country: entry.country.unwrap_or_else(|| player.country.clone()),
                club: entry.club.or_else(|| player.club.clone()),
                slug: entry.slug.unwrap_or_default(),
                profile: entry.profile,
            })
            .await;
        match added {
            Ok(candidate) => {
                println!(
                    "Candidate: {} {} ({})",
                    candidate.year, candidate.player_name, candidate.slug
                );
                summary.candidates += 1;
            }
            // Already nominated by an earlier import.
            Err(StoreError::Conflict(msg)) => println!("Skipped: {msg}"),
            Err(err) => return Err(err.into()),
        }
    }

    for entry in data.results {
        let rank = entry.rank.parse().ok_or_else(|| {
            Error::Data(format!(
                "Invalid rank {:?} for {}",
                entry.rank, entry.player
            ))
        })?;
        let name = entry.player.trim();
        let player = players.resolve(name, entry.nationality.as_deref()).await?;
        let result = store
            .record_award_result(AwardResultCore {
                year: entry.year,
                rank,
                player_id: player.id,
                player_name: player.name.clone(),
                club_at_award: entry.club.trim().to_string(),
                nationality_at_award: entry.nationality.unwrap_or_else(|| player.country.clone()),
                // Missing points are recorded as zero.
                points: entry.points.map_or(0, |points| points.max(0.0) as u32),
            })
            .await?;
        println!(
            "Result: {} #{} {}",
            result.year, result.rank, result.player_name
        );
        summary.results += 1;
    }

    Ok(summary)
}

/// Connect to the database and import the file.
async fn connect_and_import(path: &str, db_uri: &str, db_name: &str) -> Result<Summary, Error> {
    let data = load(path)?;
    let client = MongoClient::with_uri_str(db_uri).await?;
    let db = client.database(db_name);
    ensure_indexes_exist(&db).await?;
    import(&MongoStore::new(db), data).await
}

/// Run the import, report the result, and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    // Arguments are required or have defaults, so they are guaranteed to be present.
    let path: &String = args.get_one(DATA_PATH).unwrap();
    let db_uri: &String = args.get_one(DB_URI).unwrap();
    let db_name: &String = args.get_one(DB_NAME).unwrap();

    match connect_and_import(path, db_uri, db_name).await {
        Ok(summary) => {
            println!("Import succeeded: {summary}.");
            0
        }
        Err(err) => {
            println!("{err}");
            1
        }
    }
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use fansaward_backend::store::{CandidateProvider, MemoryStore, ResultArchive};

    use super::*;

    const EXAMPLE: &str = r#"{
        "players": [
            {"name": "Lamine Yamal", "country": "Spain", "club": "Barcelona"},
            {"name": "Rodri", "country": "Spain", "club": "Manchester City"}
        ],
        "candidates": [
            {"year": 2025, "player": "Lamine Yamal", "goals": 18, "avg_match_rating": 8.1},
            {"year": 2025, "player": "Vitinha", "country": "Portugal", "club": "Paris Saint-Germain"}
        ],
        "results": [
            {"year": 2024, "rank": "1st", "player": "Rodri", "club": "Manchester City", "points": 1170.0},
            {"year": 2024, "rank": 2, "player": "Vinícius Júnior", "club": "Real Madrid", "nationality": "Brazil"}
        ]
    }"#;

    #[test]
    fn ranks() {
        let rank = |json: &str| serde_json::from_str::<RankEntry>(json).unwrap().parse();
        assert_eq!(rank(r#""1st""#), Some(1));
        assert_eq!(rank(r#""2nd""#), Some(2));
        assert_eq!(rank(r#""3rd""#), Some(3));
        assert_eq!(rank(r#""24th""#), Some(24));
        assert_eq!(rank("7"), Some(7));
        assert_eq!(rank(r#""first""#), None);
        assert_eq!(rank("0"), None);
    }

    #[test]
    fn arguments() {
        let args = cli()
            .try_get_matches_from([PROGRAM_NAME, "data.json"])
            .unwrap();
        assert_eq!(args.get_one::<String>(DATA_PATH).unwrap(), "data.json");
        assert_eq!(args.get_one::<String>(DB_NAME).unwrap(), "fansaward");

        let args = cli()
            .try_get_matches_from([PROGRAM_NAME, "data.json", "--db-name", "other"])
            .unwrap();
        assert_eq!(args.get_one::<String>(DB_NAME).unwrap(), "other");

        assert!(cli().try_get_matches_from([PROGRAM_NAME]).is_err());
    }

    #[test]
    fn missing_file() {
        assert!(matches!(load("no/such/file.json"), Err(Error::IO(_))));
    }

    #[rocket::async_test]
    async fn import_example() {
        let store = MemoryStore::new();
        let data = serde_json::from_str(EXAMPLE).unwrap();

        let summary = import(&store, data).await.unwrap();
        assert_eq!(
            summary,
            Summary {
                players: 2,
                candidates: 2,
                results: 2,
            }
        );

        let mut candidates = store.candidates_for_year(2025).await.unwrap();
        candidates.sort_by(|a, b| a.player_name.cmp(&b.player_name));
        assert_eq!(candidates[0].slug, "lamine-yamal");
        assert_eq!(candidates[0].club.as_deref(), Some("Barcelona"));
        assert_eq!(candidates[0].profile.goals, 18);
        assert_eq!(candidates[1].country, "Portugal");

        let (results, total) = store.award_results(0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(results[0].player_name, "Rodri");
        assert_eq!(results[0].points, 1170);
        assert_eq!(results[0].nationality_at_award, "Spain");
        assert_eq!(results[1].points, 0);

        // Importing again updates in place.
        let data = serde_json::from_str(EXAMPLE).unwrap();
        let summary = import(&store, data).await.unwrap();
        assert_eq!(summary.candidates, 0);
        assert_eq!(summary.results, 2);
        assert_eq!(store.candidates_for_year(2025).await.unwrap().len(), 2);
        let (_, total) = store.award_results(0, 10).await.unwrap();
        assert_eq!(total, 2);
    }

    #[rocket::async_test]
    async fn unknown_player_without_country() {
        let data = serde_json::from_str(r#"{"candidates": [{"year": 2025, "player": "Nobody"}]}"#)
            .unwrap();
        assert!(matches!(
            import(&MemoryStore::new(), data).await,
            Err(Error::Data(_))
        ));
    }
}
