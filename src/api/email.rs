//! Outbound email contract and senders.
//!
//! The core only depends on a narrow delivery contract: recipient, subject,
//! plaintext body, HTML body. Delivery failures are tolerated (a reset token
//! stays valid even when the email never leaves), so dispatch is
//! fire-and-forget and errors are only logged.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const MAILGUN_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully rendered outbound message.
#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error for the caller to log.
    fn send(&self, message: EmailMessage) -> SendFuture<'_>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: EmailMessage) -> SendFuture<'_> {
        Box::pin(async move {
            info!(
                to = %message.to,
                subject = %message.subject,
                "email send stub"
            );
            Ok(())
        })
    }
}

/// Mailgun API sender: form POST against the messages endpoint with the API
/// key as basic-auth password.
pub struct MailgunSender {
    api_key: SecretString,
    domain: String,
    from: String,
    client: Client,
}

impl MailgunSender {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: SecretString, domain: String, from: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(MAILGUN_TIMEOUT)
            .build()
            .context("failed to build mailgun client")?;
        Ok(Self {
            api_key,
            domain,
            from,
            client,
        })
    }
}

impl EmailSender for MailgunSender {
    fn send(&self, message: EmailMessage) -> SendFuture<'_> {
        Box::pin(async move {
            let url = format!("https://api.mailgun.net/v3/{}/messages", self.domain);
            let params = [
                ("from", self.from.as_str()),
                ("to", message.to.as_str()),
                ("subject", message.subject.as_str()),
                ("text", message.text_body.as_str()),
                ("html", message.html_body.as_str()),
            ];

            let response = self
                .client
                .post(&url)
                .basic_auth("api", Some(self.api_key.expose_secret()))
                .form(&params)
                .send()
                .await
                .context("failed to reach mailgun")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!("mailgun API error: {status} - {body}"));
            }

            Ok(())
        })
    }
}

/// Render the password-reset email pointing at `reset_url`.
pub(crate) fn password_reset_email(to: &str, reset_url: &str) -> EmailMessage {
    let text_body = format!(
        "Hello,\n\n\
         You requested to reset your password. Click the link below to reset it:\n\n\
         {reset_url}\n\n\
         This link will expire in 1 hour.\n\n\
         If you didn't request this, please ignore this email."
    );
    let html_body = format!(
        "<html>\n<body>\n\
         \t<h2>Reset Your Password</h2>\n\
         \t<p>Hello,</p>\n\
         \t<p>You requested to reset your password. Click the link below to reset it:</p>\n\
         \t<p><a href=\"{reset_url}\">Reset Password</a></p>\n\
         \t<p>This link will expire in 1 hour.</p>\n\
         \t<p>If you didn't request this, please ignore this email.</p>\n\
         </body>\n</html>"
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Reset Your Password".to_string(),
        text_body,
        html_body,
    }
}

/// Fire-and-forget delivery; failures are logged and never surfaced.
pub(crate) fn spawn_send(sender: Arc<dyn EmailSender>, message: EmailMessage) {
    tokio::spawn(async move {
        if let Err(err) = sender.send(message).await {
            error!("failed to send email: {err:#}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_reset_email_embeds_link() {
        let message = password_reset_email(
            "alice@x.com",
            "http://localhost:5173/reset-password?token=abc",
        );
        assert_eq!(message.to, "alice@x.com");
        assert_eq!(message.subject, "Reset Your Password");
        assert!(message
            .text_body
            .contains("http://localhost:5173/reset-password?token=abc"));
        assert!(message
            .html_body
            .contains("<a href=\"http://localhost:5173/reset-password?token=abc\">"));
        assert!(message.text_body.contains("expire in 1 hour"));
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let sender = LogEmailSender;
        let message = password_reset_email("alice@x.com", "http://localhost/reset");
        assert!(sender.send(message).await.is_ok());
    }
}
