use anyhow::Context;
use chrono::Utc;
use practice_tracker::config::{AppConfig, load_environment};
use practice_tracker::connect_database;
use practice_tracker::mail::mailer_from_config;
use practice_tracker::suggestions::run_suggestion_sweep;
use practice_tracker::telemetry::{init_tracing, shutdown_telemetry};

/// One pass of the suggestion sweep, meant to be started by an external
/// scheduler once a day.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_environment().map_err(|e| anyhow::anyhow!("Failed to load environment: {}", e))?;
    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(&config);

    let pool = connect_database(&config)
        .await
        .context("Failed to open database")?;
    let mailer = mailer_from_config(&config).context("Failed to set up mailer")?;

    let today = Utc::now().date_naive();
    let report = run_suggestion_sweep(&pool, mailer.as_ref(), &config.mail_from, today)
        .await
        .context("Suggestion sweep failed")?;

    println!(
        "Checked {} tasks: {} suggested, {} mails sent, {} mails failed",
        report.tasks_seen, report.suggested, report.mails_sent, report.mail_failures
    );

    pool.close().await;
    shutdown_telemetry();
    Ok(())
}
