use secrecy::SecretString;

/// Settings shared across actions: frontend base URL, TOTP issuer, and the
/// optional Mailgun credentials for outbound email.
#[derive(Clone)]
pub struct GlobalArgs {
    pub base_url: String,
    pub totp_issuer: String,
    pub mailgun_api_key: Option<SecretString>,
    pub mailgun_domain: Option<String>,
    pub mailgun_from: Option<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(base_url: String, totp_issuer: String) -> Self {
        Self {
            base_url,
            totp_issuer,
            mailgun_api_key: None,
            mailgun_domain: None,
            mailgun_from: None,
        }
    }

    /// The Mailgun settings, when all three are configured.
    #[must_use]
    pub fn mailgun(&self) -> Option<(SecretString, String, String)> {
        match (
            self.mailgun_api_key.as_ref(),
            self.mailgun_domain.as_ref(),
            self.mailgun_from.as_ref(),
        ) {
            (Some(api_key), Some(domain), Some(from)) => {
                Some((api_key.clone(), domain.clone(), from.clone()))
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("base_url", &self.base_url)
            .field("totp_issuer", &self.totp_issuer)
            .field("mailgun_api_key", &self.mailgun_api_key.as_ref().map(|_| "***"))
            .field("mailgun_domain", &self.mailgun_domain)
            .field("mailgun_from", &self.mailgun_from)
            .finish()
    }
}
