use crate::api::{self, AuthConfig, EmailSender, LogEmailSender, MailgunSender};
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

/// Handle the server action
///
/// # Errors
///
/// Returns an error if the server fails to start or stops unexpectedly.
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            let auth_config = AuthConfig::new(globals.base_url.clone())
                .with_totp_issuer(globals.totp_issuer.clone());

            // Without Mailgun credentials the reset flow still works; the
            // token stays valid and the email is only logged.
            let email_sender: Arc<dyn EmailSender> = match globals.mailgun() {
                Some((api_key, domain, from)) => {
                    Arc::new(MailgunSender::new(api_key, domain, from)?)
                }
                None => {
                    warn!("Mailgun is not configured, outbound email will be logged only");
                    Arc::new(LogEmailSender)
                }
            };

            api::new(port, dsn, auth_config, email_sender).await?;
        }
    }

    Ok(())
}
