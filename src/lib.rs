#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{AwsFairing, Config, ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::notify::DynNotifier;
use crate::store::DynStore;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod store;
pub mod tally;
pub mod workflow;

/// The production server: configuration, MongoDB and Amazon SES are all
/// loaded from the Rocket figment during ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(AwsFairing)
        .mount("/", api::routes())
}

/// A server around the given collaborators, without touching any external
/// service.
pub fn build_with(store: DynStore, notifier: DynNotifier, config: Config) -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .manage(config)
        .manage(store)
        .manage(notifier)
        .mount("/", api::routes())
}
