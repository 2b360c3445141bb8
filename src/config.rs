//! Configuration types, built from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;

/// IMAP mailbox configuration.
///
/// Always constructible; [`ImapConfig::is_configured`] reports whether the
/// required fields are present. An unconfigured transport fails per
/// connection, which the read paths swallow into empty results.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Mailbox opened by default for fetches.
    pub mailbox: String,
    /// Default number of messages returned by a fetch.
    pub fetch_limit: usize,
    /// When true, fetching bodies also sets `\Seen` on the server.
    pub mark_as_seen: bool,
}

impl ImapConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("IMAP_HOST").unwrap_or_default(),
            port: std::env::var("IMAP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(993),
            username: std::env::var("IMAP_USERNAME").unwrap_or_default(),
            password: std::env::var("IMAP_PASSWORD").unwrap_or_default(),
            mailbox: std::env::var("IMAP_MAILBOX").unwrap_or_else(|_| "INBOX".to_string()),
            fetch_limit: std::env::var("IMAP_FETCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
            mark_as_seen: std::env::var("IMAP_MARK_AS_SEEN")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

/// SMTP relay configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl SmtpConfig {
    /// Returns `None` if `SMTP_HOST` is not set; the service then falls back
    /// to a log-only sender.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;

        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();

        Some(Self {
            host,
            port,
            username,
            password,
        })
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Missing key leaves the chat endpoint returning an error, the rest of
    /// the service works without it.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub site_url: String,
    pub site_name: String,
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            model: std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-3-opus:beta".to_string()),
            site_url: std::env::var("OPENROUTER_SITE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            site_name: std::env::var("OPENROUTER_SITE_NAME")
                .unwrap_or_else(|_| "maildeck".to_string()),
        }
    }
}

/// Fixed credential pairs for the two dashboard accounts.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Admin login email; defaults to the IMAP username so the dashboard
    /// owner logs in with the mailbox address.
    pub admin_email: String,
    pub admin_password: String,
    pub guest_email: String,
    pub guest_password: String,
    pub session_secret: SecretString,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_secret = std::env::var("SESSION_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("SESSION_SECRET".to_string()))?;

        let admin_email = std::env::var("ADMIN_EMAIL")
            .or_else(|_| std::env::var("IMAP_USERNAME"))
            .unwrap_or_default();

        Ok(Self {
            admin_email,
            admin_password: std::env::var("ADMIN_PASSWORD").unwrap_or_default(),
            guest_email: std::env::var("GUEST_EMAIL").unwrap_or_default(),
            guest_password: std::env::var("GUEST_PASSWORD").unwrap_or_default(),
            session_secret: SecretString::from(session_secret),
        })
    }
}
