#[macro_use]
extern crate rocket;

pub mod auth;
pub mod calendar;
pub mod challenges;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod invitations;
pub mod mail;
pub mod models;
pub mod routes;
pub mod suggestions;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use std::str::FromStr;

use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use auth::default_catcher;
use config::AppConfig;
use error::AppError;
use telemetry::TelemetryFairing;

/// Opens the database named by `config` and brings its schema up to date.
pub async fn connect_database(config: &AppConfig) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    Ok(pool)
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting practice tracker");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount("/", routes::all())
        .register("/", catchers![default_catcher])
        .attach(TelemetryFairing)
}
