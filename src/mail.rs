use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Hands outgoing messages to whatever delivers them.
#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), AppError>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[rocket::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> Result<(), AppError> {
        info!(to = %mail.to, subject = %mail.subject, "Mail relay not configured, logging message");
        Ok(())
    }
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            relay_url: relay_url.to_string(),
        })
    }
}

#[rocket::async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, mail), fields(to = %mail.to))]
    async fn send(&self, mail: &Mail) -> Result<(), AppError> {
        let response = self.client.post(&self.relay_url).json(mail).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Mail relay responded {}: {}",
                status, body
            )));
        }

        info!("Mail handed to relay");
        Ok(())
    }
}

pub fn mailer_from_config(config: &AppConfig) -> Result<Box<dyn Mailer>, AppError> {
    match config.mail_relay_url.as_deref() {
        Some(url) => Ok(Box::new(HttpMailer::new(url)?)),
        None => Ok(Box::new(LogMailer)),
    }
}
