use practice_tracker::config::{AppConfig, load_environment};
use practice_tracker::db::clean_expired_sessions;
use practice_tracker::error::AppError;
use practice_tracker::mail::mailer_from_config;
use practice_tracker::suggestions::run_suggestion_loop;
use practice_tracker::telemetry::init_tracing;
use practice_tracker::{connect_database, init_rocket};
use rocket::tokio;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Environment(String),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Rocket(#[from] rocket::Error),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    load_environment().map_err(|e| Error::Environment(e.to_string()))?;
    let config = AppConfig::from_env()?;
    init_tracing(&config);

    let pool = connect_database(&config).await?;

    let cleanup_pool = pool.clone();
    let cleanup_interval = config.session_cleanup_interval_secs;
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&cleanup_pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(cleanup_interval)).await;
        }
    });

    if let Some(interval) = config.suggestion_sweep_interval_secs {
        info!("Suggestion sweep runs every {} seconds", interval);
        let mailer = mailer_from_config(&config)?;
        tokio::spawn(run_suggestion_loop(
            pool.clone(),
            mailer,
            config.mail_from.clone(),
            interval,
        ));
    }

    let _rocket = init_rocket(pool, config).await.launch().await?;
    Ok(())
}
