use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://practice-tracker.db?mode=rwc";

/// Upper bound for `SESSION_HOURS`: one year.
pub const MAX_SESSION_HOURS: i64 = 24 * 366;

/// Runtime settings read from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_hours: i64,
    pub session_cleanup_interval_secs: u64,
    pub suggestion_sweep_interval_secs: Option<u64>,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub otlp_endpoint: Option<String>,
    pub honeycomb_api_key: Option<String>,
    pub deployment_environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_hours: 24,
            session_cleanup_interval_secs: 3600,
            suggestion_sweep_interval_secs: None,
            mail_relay_url: None,
            mail_from: "noreply@practice-tracker.local".to_string(),
            otlp_endpoint: None,
            honeycomb_api_key: None,
            deployment_environment: "develop".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let session_hours = parse_var("SESSION_HOURS")?.unwrap_or(defaults.session_hours);
        if !(1..=MAX_SESSION_HOURS).contains(&session_hours) {
            return Err(AppError::Internal(format!(
                "SESSION_HOURS must be between 1 and {}, got {}",
                MAX_SESSION_HOURS, session_hours
            )));
        }

        Ok(Self {
            database_url: non_empty_var("DATABASE_URL").unwrap_or(defaults.database_url),
            session_hours,
            session_cleanup_interval_secs: parse_var("SESSION_CLEANUP_INTERVAL_SECS")?
                .unwrap_or(defaults.session_cleanup_interval_secs),
            suggestion_sweep_interval_secs: parse_var("SUGGESTION_SWEEP_INTERVAL_SECS")?,
            mail_relay_url: non_empty_var("MAIL_RELAY_URL"),
            mail_from: non_empty_var("MAIL_FROM").unwrap_or(defaults.mail_from),
            otlp_endpoint: non_empty_var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            honeycomb_api_key: non_empty_var("HONEYCOMB_API_KEY"),
            deployment_environment: non_empty_var("DEPLOYMENT_ENVIRONMENT")
                .unwrap_or(defaults.deployment_environment),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    dotenvy::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match non_empty_var(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AppError::Internal(format!("Invalid value for {}: {:?}", key, raw))
        }),
        None => Ok(None),
    }
}

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}
