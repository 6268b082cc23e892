use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sesv2::{
    config::{Credentials, Region},
    Client as SesClient,
};
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;
use crate::notify::{DynNotifier, SesNotifier};
use crate::store::{DynStore, MongoStore};
use crate::tally::LIVE_RESULTS_LIMIT;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    site_url: String,
    #[serde(default = "default_leaderboard_size")]
    leaderboard_size: usize,
}

fn default_leaderboard_size() -> usize {
    LIVE_RESULTS_LIMIT
}

impl Config {
    pub fn new(site_url: impl Into<String>, leaderboard_size: usize) -> Self {
        Self {
            site_url: site_url.into(),
            leaderboard_size,
        }
    }

    /// Public base URL of the site, used to build verification links.
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Number of entries on the live leaderboard.
    pub fn leaderboard_size(&self) -> usize {
        self.leaderboard_size
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "fansaward".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// makes sure the indexes exist, and places the resulting store into
/// managed state as a [`DynStore`].
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to set up database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let store: DynStore = Arc::new(MongoStore::new(db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Configuration for the AWS connection.
#[derive(Deserialize)]
struct AwsConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    email_from: String,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that loads the AWS config and places an SES-backed
/// [`DynNotifier`] into managed state.
pub struct AwsFairing;

#[rocket::async_trait]
impl Fairing for AwsFairing {
    fn info(&self) -> Info {
        Info {
            name: "AWS SES",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<AwsConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load AWS config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        // Construct the connection.
        let aws_config = SdkConfig::builder()
            .region(Region::new(config.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                config.aws_access_key_id,
                config.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let client = SesClient::new(&aws_config);
        info!("Loaded Amazon SES config");

        // Manage the state.
        let notifier: DynNotifier = Arc::new(SesNotifier::new(client, config.email_from));
        rocket = rocket.manage(notifier);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn leaderboard_size_defaults_to_live_limit() {
        let figment =
            Figment::new().merge(Serialized::default("site_url", "https://fansaward.example"));
        let config = figment.extract::<Config>().unwrap();
        assert_eq!(config.site_url(), "https://fansaward.example");
        assert_eq!(config.leaderboard_size(), LIVE_RESULTS_LIMIT);
    }
}
