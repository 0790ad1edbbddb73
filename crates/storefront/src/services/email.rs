//! Transactional email API client.
//!
//! Posts messages to `{base}/emails` with the API key as a bearer token and
//! returns the provider's message ID.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use ticket_booth_core::{Email, OutgoingEmail};

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Request body for the provider's send endpoint.
#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Transactional email API client.
#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    endpoint: Url,
    from: String,
    admin_notification_email: Option<Email>,
}

impl EmailClient {
    /// Create a new email client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value, the base URL
    /// cannot be joined, or the HTTP client fails to build.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let mut headers = HeaderMap::new();
        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|e| EmailError::Config(format!("invalid API key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            endpoint: emails_endpoint(&config.api_base_url)?,
            from: config.from.clone(),
            admin_notification_email: config.admin_notification_email.clone(),
        })
    }

    /// Address that receives completed-order notices, if configured.
    #[must_use]
    pub const fn admin_notification_email(&self) -> Option<&Email> {
        self.admin_notification_email.as_ref()
    }

    /// Send a message and return the provider's message ID.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider rejects the message.
    #[tracing::instrument(skip(self, email), fields(email_type = %email.email_type, recipients = email.to.len()))]
    pub async fn send(&self, email: &OutgoingEmail) -> Result<String, EmailError> {
        let body = SendEmailBody {
            from: &self.from,
            to: email.to.iter().map(Email::as_str).collect(),
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SendEmailResponse = response.json().await?;
        tracing::info!(provider_id = %sent.id, "Email sent");
        Ok(sent.id)
    }
}

fn emails_endpoint(base: &Url) -> Result<Url, EmailError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("emails")
        .map_err(|e| EmailError::Config(format!("invalid API base URL: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_emails_endpoint() {
        let url = |s: &str| emails_endpoint(&Url::parse(s).unwrap()).unwrap().to_string();
        assert_eq!(url("https://api.resend.com"), "https://api.resend.com/emails");
        assert_eq!(url("https://mail.test/v1"), "https://mail.test/v1/emails");
        assert_eq!(url("https://mail.test/v1/"), "https://mail.test/v1/emails");
    }

    #[test]
    fn test_send_body_shape() {
        let body = SendEmailBody {
            from: "Ticket Booth <tickets@booth.test>",
            to: vec!["a@booth.test", "b@booth.test"],
            subject: "Hello",
            html: "<p>Hi</p>",
            text: "Hi",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"][1], "b@booth.test");
        assert_eq!(json["from"], "Ticket Booth <tickets@booth.test>");
        assert_eq!(json["html"], "<p>Hi</p>");
    }
}
