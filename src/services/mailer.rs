// src/services/mailer.rs

//! Digest delivery.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::MailConfig;
use crate::pipeline::Digest;

/// Delivers a rendered digest.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, digest: &Digest) -> Result<()>;
}

/// Sends through an implicit-TLS SMTP relay with login credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from config, reading the password from the environment
    /// variable named by `password_env`.
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let password = std::env::var(&config.password_env).map_err(|_| {
            AppError::config(format!(
                "SMTP password variable {} is not set",
                config.password_env
            ))
        })?;
        Self::with_password(config, password)
    }

    pub fn with_password(config: &MailConfig, password: String) -> Result<Self> {
        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|e| AppError::config(format!("mail.sender: {e}")))?;
        let to: Mailbox = config
            .receiver
            .parse()
            .map_err(|e| AppError::config(format!("mail.receiver: {e}")))?;
        let username = config.username.clone().unwrap_or_else(|| config.sender.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(AppError::mail)?
            .port(config.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport, from, to })
    }

    fn build_message(&self, digest: &Digest) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(digest.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                digest.plain.clone(),
                digest.html.clone(),
            ))
            .map_err(AppError::mail)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let message = self.build_message(digest)?;
        self.transport.send(message).await.map_err(AppError::mail)?;
        log::info!("Sent \"{}\" to {}", digest.subject, self.to);
        Ok(())
    }
}

/// Writes each digest into a directory instead of sending it.
///
/// Produces `{stamp}.txt`, `{stamp}.html` and `{stamp}.json` per digest.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, digest: &Digest) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f").to_string();

        let text_path = self.dir.join(format!("{stamp}.txt"));
        let body = format!("Subject: {}\r\n\r\n{}", digest.subject, digest.plain);
        tokio::fs::write(&text_path, body).await?;
        tokio::fs::write(self.dir.join(format!("{stamp}.html")), &digest.html).await?;
        tokio::fs::write(
            self.dir.join(format!("{stamp}.json")),
            serde_json::to_vec_pretty(digest)?,
        )
        .await?;

        log::info!("Digest written to {}", text_path.display());
        Ok(())
    }
}
