//! Report delivery through a transactional-mail HTTP API.

use crate::config::MailConfig;
use crate::error::MailError;
use crate::models::Report;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A rendered report ready to be mailed.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub subject: String,
    pub html: String,
    /// Files attached to the mail.
    pub attachments: Vec<PathBuf>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Subject line for a report mail.
pub fn email_subject(report: &Report) -> String {
    format!(
        "App Review Insights: {} (Avg Rating: {:.2}/5)",
        report.period.end.format("%Y-%m-%d"),
        report.totals.average_rating
    )
}

#[derive(Serialize)]
struct BrevoSender<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoRecipient<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoAttachment {
    name: String,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoPayload<'a> {
    sender: BrevoSender<'a>,
    to: Vec<BrevoRecipient<'a>>,
    subject: &'a str,
    html_content: &'a str,
    #[serde(rename = "attachment", skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<BrevoAttachment>,
}

/// Mailer for Brevo-compatible `smtp/email` endpoints.
pub struct BrevoMailer {
    api_url: String,
    api_key: String,
    sender_email: String,
    sender_name: String,
    recipients: Vec<String>,
    client: Client,
}

impl BrevoMailer {
    /// Builds a mailer, or `None` when mail is not fully configured.
    pub fn from_config(config: &MailConfig, client: Client) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }

        Some(Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone()?,
            sender_email: config.sender.clone()?,
            sender_name: config.sender_name.clone(),
            recipients: config.recipients.clone(),
            client,
        })
    }

    fn payload(
        &self,
        message: &MailMessage,
    ) -> Result<serde_json::Value, MailError> {
        let attachments = message
            .attachments
            .iter()
            .map(|path| encode_attachment(path))
            .collect::<Result<Vec<_>, _>>()?;

        let payload = BrevoPayload {
            sender: BrevoSender {
                name: &self.sender_name,
                email: &self.sender_email,
            },
            to: self
                .recipients
                .iter()
                .map(|email| BrevoRecipient { email })
                .collect(),
            subject: &message.subject,
            html_content: &message.html,
            attachments,
        };

        serde_json::to_value(&payload).map_err(|e| MailError::RequestFailed(e.to_string()))
    }
}

fn encode_attachment(path: &Path) -> Result<BrevoAttachment, MailError> {
    let bytes = std::fs::read(path).map_err(|source| MailError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());

    Ok(BrevoAttachment {
        name,
        content: STANDARD.encode(bytes),
    })
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let payload = self.payload(message)?;
        debug!(
            "Sending mail to {} recipients with {} attachments",
            self.recipients.len(),
            message.attachments.len()
        );

        let resp = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .timeout(Duration::from_secs(30))
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!("Report mailed to {}", self.recipients.join(", "));
        Ok(())
    }
}
