use std::{sync::Arc, time::Duration};

use log::*;
use pay_common::Secret;
use reqwest::{header::AUTHORIZATION, Client};
use serde_json::json;
use thiserror::Error;

use crate::dispatch::ConfirmationEmail;

#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("Mail service is not configured: {0}")]
    Configuration(String),
    #[error("Could not reach the mail service: {0}")]
    Transport(String),
    #[error("The mail service rejected the message. Error {status}. {message}")]
    Rejected { status: u16, message: String },
}

#[allow(async_fn_in_trait)]
pub trait EmailSender {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), EmailError>;
}

//--------------------------------------      HttpMailer      ---------------------------------------------------------
/// Sends mail through a transactional email HTTP API that accepts `{from, to, subject, html, text}`.
#[derive(Clone)]
pub struct HttpMailer {
    api_url: String,
    api_key: Secret<String>,
    client: Arc<Client>,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: Secret<String>) -> Result<Self, EmailError> {
        if api_key.is_empty() {
            return Err(EmailError::Configuration("No mail API key".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EmailError::Configuration(e.to_string()))?;
        Ok(Self { api_url: api_url.to_string(), api_key, client: Arc::new(client) })
    }
}

impl EmailSender for HttpMailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), EmailError> {
        let body = json!({
            "from": email.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });
        trace!("✉️ Posting email for {} to {}", email.to, self.api_url);
        let response = self
            .client
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.reveal()))
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(EmailError::Rejected { status, message })
        }
    }
}

//--------------------------------------      LogMailer      ----------------------------------------------------------
/// Writes emails to the log instead of sending them. Used when no mail service has been configured.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl EmailSender for LogMailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), EmailError> {
        info!("✉️ [not sent] To: {} Subject: {}\n{}", email.to, email.subject, email.text);
        Ok(())
    }
}

//--------------------------------------        Mailer        ---------------------------------------------------------
/// The concrete sender chosen at start-up from configuration.
#[derive(Clone)]
pub enum Mailer {
    Http(HttpMailer),
    Log(LogMailer),
}

impl Mailer {
    /// An HTTP mailer if an API URL and key are available, otherwise a log-only mailer.
    pub fn from_settings(api_url: Option<&str>, api_key: Secret<String>) -> Self {
        match api_url {
            Some(url) => match HttpMailer::new(url, api_key) {
                Ok(m) => Self::Http(m),
                Err(e) => {
                    warn!("✉️ {e}. Confirmation emails will only be logged.");
                    Self::Log(LogMailer)
                },
            },
            None => {
                warn!("✉️ No mail API URL is configured. Confirmation emails will only be logged.");
                Self::Log(LogMailer)
            },
        }
    }
}

impl EmailSender for Mailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), EmailError> {
        match self {
            Self::Http(m) => m.send(email).await,
            Self::Log(m) => m.send(email).await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn email() -> ConfirmationEmail {
        ConfirmationEmail {
            to: "a@b.co".into(),
            from: "shop@b.co".into(),
            subject: "s".into(),
            html: "<p>h</p>".into(),
            text: "t".into(),
        }
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        assert!(LogMailer.send(&email()).await.is_ok());
        let mailer = Mailer::from_settings(None, Secret::default());
        assert!(mailer.send(&email()).await.is_ok());
    }

    #[test]
    fn mailer_selection() {
        assert!(matches!(Mailer::from_settings(None, Secret::new("k".into())), Mailer::Log(_)));
        assert!(matches!(Mailer::from_settings(Some("http://mail"), Secret::default()), Mailer::Log(_)));
        assert!(matches!(Mailer::from_settings(Some("http://mail"), Secret::new("k".into())), Mailer::Http(_)));
    }
}
